//! # Builder utilities
//!
//! Shared traits for the builders of this crate: schemas, tables, joins, aggregations
//! and DDL statements all accumulate their parts with [`With`] and finish with [`Ready`].
//!

use std::{error, fmt, ops::Deref};

/// A trait for builder ad-hoc polymorphism
pub trait With<Input, Output = Self> {
    fn with(self, input: Input) -> Output;
}

/// Implement With for the unit type
impl<T, W: Default + With<T>> With<T, W> for () {
    fn with(self, input: T) -> W {
        W::default().with(input)
    }
}

pub trait WithIterator<Input> {
    fn with_iter<I: IntoIterator<Item = Input>>(self, iter: I) -> Self;
}

impl<Input, W: With<Input>> WithIterator<Input> for W {
    fn with_iter<I: IntoIterator<Item = Input>>(self, iter: I) -> Self {
        iter.into_iter().fold(self, |w, i| w.with(i))
    }
}

/// An object seen together with what it needs to be interpreted,
/// e.g. a node handle with its graph
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct WithContext<O, C> {
    pub object: O,
    pub context: C,
}

impl<O, C> Deref for WithContext<O, C> {
    type Target = O;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

/// A trait to attach a context to a value
pub trait WithoutContext: Sized {
    fn with<C>(self, context: C) -> WithContext<Self, C> {
        WithContext {
            object: self,
            context,
        }
    }
}

/// A trait enabling build when a builder is ready
pub trait Ready<Output>: Sized {
    type Error: error::Error;
    /// Build and panic in case of error
    fn build(self) -> Output
    where
        Self::Error: fmt::Debug,
    {
        match self.try_build() {
            Ok(output) => output,
            Err(err) => panic!("{:?}", err),
        }
    }
    /// Try to build
    fn try_build(self) -> Result<Output, Self::Error>;
}
