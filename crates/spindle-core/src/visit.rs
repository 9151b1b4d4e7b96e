// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preorder traversal of container trees.
//!
//! [`Node::visit_preorder`] calls the visitor for the node itself and then for
//! its children in the order the composite declares. That order is a
//! hand-written topological sort of hardware dependencies (a shared synram
//! configuration precedes the synapses using it) and must not be reordered.
//!
//! The same traversal drives four visitors:
//!
//! - [`WriteAddressVisitor`] collects write addresses,
//! - [`ReadAddressVisitor`] collects read addresses,
//! - [`EncodeVisitor`] collects encoded words,
//! - [`DecodeVisitor`] distributes response words back into the leaves.
//!
//! Because all four walk the identical tree in the identical order, the
//! `i`-th encoded word always belongs to the `i`-th write address and the
//! `i`-th response word to the `i`-th read address.
//!
//! Leaves get their [`Node`] implementation from [`leaf_node!`](crate::leaf_node).
//! Composites implement both traversal methods from one child list.
use std::fmt;

use thiserror::Error;

use crate::backend::{Address, Backend, ExecutorBackend, Word};
use crate::container::{Container, DecodeError, Leaf};
use crate::coord::TimerOnChip;
use crate::instruction::TimerValue;

/// Object-safe view of a leaf bound to its coordinate.
pub trait LeafRef {
    /// Container type name.
    fn name(&self) -> &'static str;
    /// Coordinate the leaf is visited at.
    fn coordinate(&self) -> &dyn fmt::Debug;
    /// Backends the leaf can be accessed through.
    fn supported_backends(&self) -> &'static [Backend];
    /// Backend used when none is requested.
    fn default_backend(&self) -> Backend;
    /// Executor restriction of the container type.
    fn executor_restriction(&self) -> Option<ExecutorBackend>;
    /// Words written per access.
    fn write_word_count(&self) -> usize;
    /// Words read per access.
    fn read_word_count(&self) -> usize;
    /// Write addresses at this coordinate.
    fn write_addresses(&self, backend: Backend) -> Vec<Address>;
    /// Read addresses at this coordinate.
    fn read_addresses(&self, backend: Backend) -> Vec<Address>;
    /// Encoded words of the current value.
    fn encode(&self, backend: Backend) -> Vec<Word>;
    /// Timer restarted by writing the current value.
    fn timer_reset(&self) -> Option<(TimerOnChip, TimerValue)>;
}

/// Mutable leaf view used on the read path.
pub trait LeafMut: LeafRef {
    /// Overwrites the leaf from response words.
    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError>;
}

trait Located {
    type Target: Leaf;
    fn coord(&self) -> &<Self::Target as Container>::Coord;
    fn leaf(&self) -> &Self::Target;
}

impl<L: Located> LeafRef for L {
    fn name(&self) -> &'static str {
        L::Target::NAME
    }

    fn coordinate(&self) -> &dyn fmt::Debug {
        self.coord()
    }

    fn supported_backends(&self) -> &'static [Backend] {
        L::Target::SUPPORTED_BACKENDS
    }

    fn default_backend(&self) -> Backend {
        L::Target::DEFAULT_BACKEND
    }

    fn executor_restriction(&self) -> Option<ExecutorBackend> {
        L::Target::EXECUTOR_RESTRICTION
    }

    fn write_word_count(&self) -> usize {
        L::Target::WRITE_WORDS
    }

    fn read_word_count(&self) -> usize {
        L::Target::READ_WORDS
    }

    fn write_addresses(&self, backend: Backend) -> Vec<Address> {
        L::Target::write_addresses(self.coord(), backend)
    }

    fn read_addresses(&self, backend: Backend) -> Vec<Address> {
        L::Target::read_addresses(self.coord(), backend)
    }

    fn encode(&self, backend: Backend) -> Vec<Word> {
        self.leaf().encode(backend)
    }

    fn timer_reset(&self) -> Option<(TimerOnChip, TimerValue)> {
        self.leaf().timer_reset(self.coord())
    }
}

/// A shared leaf at a coordinate.
pub struct At<'a, T: Leaf> {
    coord: &'a T::Coord,
    leaf: &'a T,
}

impl<'a, T: Leaf> At<'a, T> {
    /// Binds `leaf` to `coord`.
    pub fn new(coord: &'a T::Coord, leaf: &'a T) -> Self {
        Self { coord, leaf }
    }
}

impl<T: Leaf> Located for At<'_, T> {
    type Target = T;

    fn coord(&self) -> &T::Coord {
        self.coord
    }

    fn leaf(&self) -> &T {
        self.leaf
    }
}

/// A mutable leaf at a coordinate.
pub struct AtMut<'a, T: Leaf> {
    coord: &'a T::Coord,
    leaf: &'a mut T,
}

impl<'a, T: Leaf> AtMut<'a, T> {
    /// Binds `leaf` to `coord`.
    pub fn new(coord: &'a T::Coord, leaf: &'a mut T) -> Self {
        Self { coord, leaf }
    }
}

impl<T: Leaf> Located for AtMut<'_, T> {
    type Target = T;

    fn coord(&self) -> &T::Coord {
        self.coord
    }

    fn leaf(&self) -> &T {
        &*self.leaf
    }
}

impl<T: Leaf> LeafMut for AtMut<'_, T> {
    fn decode(&mut self, backend: Backend, words: &[Word]) -> Result<(), DecodeError> {
        self.leaf.decode(backend, words)
    }
}

/// Callback interface for shared traversals.
pub trait Visitor {
    /// Called before the children of a composite.
    fn composite(&mut self, _name: &'static str, _coord: &dyn fmt::Debug) {}
    /// Called for every leaf.
    fn leaf(&mut self, leaf: &dyn LeafRef);
}

/// Callback interface for mutable traversals.
pub trait VisitorMut {
    /// Called before the children of a composite.
    fn composite(&mut self, _name: &'static str, _coord: &dyn fmt::Debug) {}
    /// Called for every leaf.
    fn leaf(&mut self, leaf: &mut dyn LeafMut);
}

/// A container that can be walked in preorder.
pub trait Node: Container {
    /// Visits `self` and then its children in declared order.
    fn visit_preorder<V: Visitor + ?Sized>(&self, coord: &Self::Coord, visitor: &mut V);

    /// Mutable counterpart of [`Node::visit_preorder`]; identical order.
    fn visit_preorder_mut<V: VisitorMut + ?Sized>(&mut self, coord: &Self::Coord, visitor: &mut V);
}

/// Implements [`Node`] for leaf containers.
#[macro_export]
macro_rules! leaf_node {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Node for $ty {
                fn visit_preorder<V: $crate::Visitor + ?Sized>(
                    &self,
                    coord: &<Self as $crate::Container>::Coord,
                    visitor: &mut V,
                ) {
                    visitor.leaf(&$crate::visit::At::new(coord, self));
                }

                fn visit_preorder_mut<V: $crate::VisitorMut + ?Sized>(
                    &mut self,
                    coord: &<Self as $crate::Container>::Coord,
                    visitor: &mut V,
                ) {
                    visitor.leaf(&mut $crate::visit::AtMut::new(coord, self));
                }
            }
        )+
    };
}

/// Walks `node` at `coord` with a shared visitor.
pub fn visit_preorder<N: Node, V: Visitor + ?Sized>(node: &N, coord: &N::Coord, visitor: &mut V) {
    node.visit_preorder(coord, visitor);
}

/// Walks `node` at `coord` with a mutable visitor.
pub fn visit_preorder_mut<N: Node, V: VisitorMut + ?Sized>(
    node: &mut N,
    coord: &N::Coord,
    visitor: &mut V,
) {
    node.visit_preorder_mut(coord, visitor);
}

/// A leaf was accessed through a backend it does not support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{container} at {coordinate} does not support backend {backend}")]
pub struct UnsupportedBackend {
    /// Container type name.
    pub container: &'static str,
    /// Debug rendering of the coordinate.
    pub coordinate: String,
    /// Requested backend.
    pub backend: Backend,
}

/// Picks the backend for `leaf`: the explicit one if given, otherwise its default.
pub fn resolve_backend(
    leaf: &dyn LeafRef,
    explicit: Option<Backend>,
) -> Result<Backend, UnsupportedBackend> {
    let backend = explicit.unwrap_or_else(|| leaf.default_backend());
    if leaf.supported_backends().contains(&backend) {
        Ok(backend)
    } else {
        Err(UnsupportedBackend {
            container: leaf.name(),
            coordinate: format!("{:?}", leaf.coordinate()),
            backend,
        })
    }
}

/// Collects write addresses in traversal order.
#[derive(Debug, Default)]
pub struct WriteAddressVisitor {
    backend: Option<Backend>,
    /// Addresses collected so far.
    pub addresses: Vec<Address>,
    /// Executor restrictions of the visited leaves.
    pub restrictions: Vec<ExecutorBackend>,
    /// First backend violation, if any.
    pub error: Option<UnsupportedBackend>,
}

impl WriteAddressVisitor {
    /// Visitor using `backend`, or each leaf's default when `None`.
    pub fn new(backend: Option<Backend>) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }
}

impl Visitor for WriteAddressVisitor {
    fn leaf(&mut self, leaf: &dyn LeafRef) {
        match resolve_backend(leaf, self.backend) {
            Ok(backend) => {
                self.addresses.extend(leaf.write_addresses(backend));
                self.restrictions.extend(leaf.executor_restriction());
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }
}

/// Collects read addresses in traversal order.
#[derive(Debug, Default)]
pub struct ReadAddressVisitor {
    backend: Option<Backend>,
    /// Addresses collected so far.
    pub addresses: Vec<Address>,
    /// Executor restrictions of the visited leaves.
    pub restrictions: Vec<ExecutorBackend>,
    /// First backend violation, if any.
    pub error: Option<UnsupportedBackend>,
}

impl ReadAddressVisitor {
    /// Visitor using `backend`, or each leaf's default when `None`.
    pub fn new(backend: Option<Backend>) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }
}

impl Visitor for ReadAddressVisitor {
    fn leaf(&mut self, leaf: &dyn LeafRef) {
        match resolve_backend(leaf, self.backend) {
            Ok(backend) => {
                self.addresses.extend(leaf.read_addresses(backend));
                self.restrictions.extend(leaf.executor_restriction());
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }
}

/// Collects encoded words in traversal order.
#[derive(Debug, Default)]
pub struct EncodeVisitor {
    backend: Option<Backend>,
    /// Words collected so far.
    pub words: Vec<Word>,
    /// Timers restarted by the visited leaves, in order.
    pub timer_resets: Vec<(TimerOnChip, TimerValue)>,
    /// First backend violation, if any.
    pub error: Option<UnsupportedBackend>,
}

impl EncodeVisitor {
    /// Visitor using `backend`, or each leaf's default when `None`.
    pub fn new(backend: Option<Backend>) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }
}

impl Visitor for EncodeVisitor {
    fn leaf(&mut self, leaf: &dyn LeafRef) {
        match resolve_backend(leaf, self.backend) {
            Ok(backend) => {
                self.words.extend(leaf.encode(backend));
                self.timer_resets.extend(leaf.timer_reset());
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }
}

/// Hands consecutive slices of response words to each leaf.
#[derive(Debug)]
pub struct DecodeVisitor<'w> {
    backend: Option<Backend>,
    words: &'w [Word],
    cursor: usize,
    /// First failure, if any. Later leaves are skipped once set.
    pub error: Option<DecodeError>,
}

impl<'w> DecodeVisitor<'w> {
    /// Visitor consuming `words` with `backend`, or each leaf's default.
    pub fn new(backend: Option<Backend>, words: &'w [Word]) -> Self {
        Self {
            backend,
            words,
            cursor: 0,
            error: None,
        }
    }

    /// Words handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl VisitorMut for DecodeVisitor<'_> {
    fn leaf(&mut self, leaf: &mut dyn LeafMut) {
        if self.error.is_some() {
            return;
        }
        let n = leaf.read_word_count();
        let backend = self.backend.unwrap_or_else(|| leaf.default_backend());
        let end = self.cursor + n;
        let Some(words) = self.words.get(self.cursor..end) else {
            self.error = Some(DecodeError::WordCount {
                container: leaf.name(),
                expected: n,
                actual: self.words.len().saturating_sub(self.cursor),
            });
            return;
        };
        self.cursor = end;
        if let Err(e) = leaf.decode(backend, words) {
            self.error = Some(e);
        }
    }
}
