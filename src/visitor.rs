//! # Some utilities to ease the implementation of Visitor / Acceptor in rust
//!
//! Visited structures do not have to be trees, they can be Directed Acyclic Graphs (DAGs).
//! The `accept` code makes sure the same node is not visited more than once.
//!
//! Acceptors are small copyable handles (see [`crate::expr::Handle`]), so the machinery
//! moves them by value.
//!

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    iter,
    ops::{Deref, DerefMut},
};

/// The list of other acceptors an acceptor is depending on
#[derive(Clone, Debug)]
pub struct Dependencies<A>(Vec<A>);

impl<A> Dependencies<A> {
    pub fn new(dependencies: Vec<A>) -> Self {
        Dependencies(dependencies)
    }

    pub fn empty() -> Self {
        Dependencies(vec![])
    }
}

impl<A> Deref for Dependencies<A> {
    type Target = Vec<A>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A> DerefMut for Dependencies<A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<A> IntoIterator for Dependencies<A> {
    type Item = A;
    type IntoIter = <Vec<A> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<A> FromIterator<A> for Dependencies<A> {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        Dependencies::new(iter.into_iter().collect())
    }
}

/// The dependencies of an acceptor, with their visited values
pub struct Visited<A: PartialEq, O>(Vec<(A, O)>);

impl<A: PartialEq, O> Visited<A, O> {
    pub fn new() -> Self {
        Visited(vec![])
    }

    fn push(&mut self, acceptor: A, output: O) {
        self.0.push((acceptor, output))
    }

    pub fn get(&self, acceptor: A) -> Option<&O> {
        self.iter().find(|(a, _)| *a == acceptor).map(|(_, o)| o)
    }

    pub fn find<P: Fn(A) -> bool>(&self, predicate: P) -> Option<&O>
    where
        A: Copy,
    {
        self.iter().find(|(a, _)| predicate(*a)).map(|(_, o)| o)
    }
}

impl<A: PartialEq, O> Default for Visited<A, O> {
    fn default() -> Self {
        Visited::new()
    }
}

impl<A: PartialEq, O> Deref for Visited<A, O> {
    type Target = Vec<(A, O)>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A: PartialEq, O> DerefMut for Visited<A, O> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<A: PartialEq, O> IntoIterator for Visited<A, O> {
    type Item = (A, O);
    type IntoIter = <Vec<(A, O)> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A generic visitor
pub trait Visitor<A: Acceptor, O: Clone> {
    /// Called on each node with its dependencies already visited
    fn visit(&self, acceptor: A, dependencies: Visited<A, O>) -> O;
    /// The dependencies to follow, override to prune the traversal
    fn dependencies(&self, acceptor: A) -> Dependencies<A> {
        acceptor.dependencies()
    }
}

/// The identity Visitor
pub struct Identity;

impl<A: Acceptor> Visitor<A, A> for Identity {
    fn visit(&self, acceptor: A, _dependencies: Visited<A, A>) -> A {
        acceptor
    }
}

pub type Iter<A> = iter::FilterMap<Iterator<A, Identity, A>, fn((A, State<A>)) -> Option<A>>;

pub type IterWith<O, A, V> =
    iter::FilterMap<Iterator<O, V, A>, fn((A, State<O>)) -> Option<(A, O)>>;

/// A generic acceptor trait
pub trait Acceptor: Copy + Debug + Eq + Hash {
    /// All the sub-objects to visit
    fn dependencies(&self) -> Dependencies<Self>;

    /// Run the visitor bottom-up and return the value computed for `self`
    fn accept<O: Clone, V: Visitor<Self, O>>(self, visitor: V) -> O {
        let mut last = None;
        for (acceptor, state) in Iterator::new(visitor, self) {
            if let (true, State::Accept(output)) = (acceptor == self, state) {
                last = Some(output);
            }
        }
        match last {
            Some(output) => output,
            None => panic!("Acceptor {:?} was never accepted, is the graph cyclic?", self),
        }
    }

    /// Each reachable acceptor once, dependencies first
    fn iter(self) -> Iter<Self> {
        Iterator::new(Identity, self).filter_map(|(_a, s)| match s {
            State::Accept(o) => Some(o),
            _ => None,
        })
    }

    fn iter_with<O: Clone, V: Visitor<Self, O>>(self, visitor: V) -> IterWith<O, Self, V> {
        Iterator::new(visitor, self).filter_map(|(a, s)| match s {
            State::Accept(o) => Some((a, o)),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum State<O> {
    Push,
    Visit,
    Accept(O),
}

pub struct Iterator<O: Clone, V: Visitor<A, O>, A: Acceptor> {
    stack: Vec<A>,
    state: HashMap<A, State<O>>,
    visitor: V,
}

/// A visitor iterator implements roughly [DFS](https://en.wikipedia.org/wiki/Topological_sorting)
/// Acceptors, when submitted for visit, are checked:
/// - if already accepted, nothing happens
/// - if already visited, fails because of cyclic graph
/// - if unknown, add as visited and visit its requirements.
impl<O: Clone, V: Visitor<A, O>, A: Acceptor> Iterator<O, V, A> {
    pub fn new(visitor: V, acceptor: A) -> Iterator<O, V, A> {
        Iterator {
            stack: vec![acceptor],
            state: HashMap::from([(acceptor, State::Push)]),
            visitor,
        }
    }
}

impl<O: Clone, V: Visitor<A, O>, A: Acceptor> iter::Iterator for Iterator<O, V, A> {
    type Item = (A, State<O>);

    fn next(&mut self) -> Option<(A, State<O>)> {
        let acceptor = self.stack.pop()?;
        match self.state.get(&acceptor)? {
            State::Push => {
                self.state.insert(acceptor, State::Visit);
                self.stack.push(acceptor);
                for dependency in self.visitor.dependencies(acceptor) {
                    match self.state.get(&dependency) {
                        Some(State::Push) => (),
                        // The node is its own ancestor
                        Some(State::Visit) => return None,
                        Some(State::Accept(_)) => (),
                        None => {
                            self.state.insert(dependency, State::Push);
                        }
                    }
                    self.stack.push(dependency);
                }
                Some((acceptor, State::Visit))
            }
            State::Visit => {
                let mut dependencies = Visited::new();
                for dependency in self.visitor.dependencies(acceptor) {
                    if let Some(State::Accept(o)) = self.state.get(&dependency) {
                        dependencies.push(dependency, o.clone());
                    } else {
                        return None;
                    }
                }
                let output = self.visitor.visit(acceptor, dependencies);
                self.state.insert(acceptor, State::Accept(output.clone()));
                Some((acceptor, State::Accept(output)))
            }
            State::Accept(_) => Some((acceptor, State::Push)),
        }
    }
}
