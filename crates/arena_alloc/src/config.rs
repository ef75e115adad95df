//! # Strategy Configuration
//!
//! Picks an allocation strategy from a TOML document loaded once at startup.
//!
//! ```toml
//! strategy = "free_list"
//! default_alignment = 16
//! ```

use serde::{Deserialize, Serialize};

use crate::allocator::{Allocation, Allocator, DEFAULT_ALIGNMENT};
use crate::bump::BumpAllocator;
use crate::error::{AllocError, AllocResult};
use crate::free_list::FreeListAllocator;

/// Available allocation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Linear allocation, freed all at once.
    Bump,
    /// First-fit reuse with coalescing.
    FreeList,
}

/// Allocator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Which strategy manages the arena.
    pub strategy: Strategy,
    /// Alignment for [`Allocator::allocate_default`].
    #[serde(default = "default_alignment")]
    pub default_alignment: usize,
}

const fn default_alignment() -> usize {
    DEFAULT_ALIGNMENT
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::FreeList,
            default_alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl AllocatorConfig {
    /// Parses and validates a TOML config.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> AllocResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| AllocError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a TOML file cannot constrain on its own.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] if `default_alignment` is not a power of
    /// two.
    pub fn validate(&self) -> AllocResult<()> {
        if !self.default_alignment.is_power_of_two() {
            return Err(AllocError::InvalidConfig(format!(
                "default_alignment must be a power of two, got {}",
                self.default_alignment
            )));
        }
        Ok(())
    }

    /// Builds the configured allocator over `arena`.
    ///
    /// # Errors
    ///
    /// [`AllocError::InvalidConfig`] from [`AllocatorConfig::validate`], or
    /// [`AllocError::ArenaTooSmall`] if the strategy cannot fit its
    /// bookkeeping.
    pub fn build<'a>(&self, arena: &'a mut [u8]) -> AllocResult<ArenaAllocator<'a>> {
        self.validate()?;

        let inner = match self.strategy {
            Strategy::Bump => Inner::Bump(BumpAllocator::new(arena)?),
            Strategy::FreeList => Inner::FreeList(FreeListAllocator::new(arena)?),
        };

        tracing::debug!(
            "built {:?} allocator, default alignment {}",
            self.strategy,
            self.default_alignment
        );

        Ok(ArenaAllocator {
            inner,
            default_alignment: self.default_alignment,
        })
    }
}

enum Inner<'a> {
    Bump(BumpAllocator<'a>),
    FreeList(FreeListAllocator<'a>),
}

/// An allocator whose strategy was chosen at runtime.
pub struct ArenaAllocator<'a> {
    inner: Inner<'a>,
    default_alignment: usize,
}

impl<'a> ArenaAllocator<'a> {
    /// The strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        match self.inner {
            Inner::Bump(_) => Strategy::Bump,
            Inner::FreeList(_) => Strategy::FreeList,
        }
    }

    /// Releases every allocation of a bump strategy.
    ///
    /// # Panics
    ///
    /// Panics for the free-list strategy, which frees per allocation.
    pub fn clear(&mut self) {
        match &mut self.inner {
            Inner::Bump(bump) => bump.clear(),
            Inner::FreeList(_) => panic!("clear() is only supported by the bump strategy"),
        }
    }

    fn as_dyn(&self) -> &(dyn Allocator + 'a) {
        match &self.inner {
            Inner::Bump(bump) => bump,
            Inner::FreeList(free_list) => free_list,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut (dyn Allocator + 'a) {
        match &mut self.inner {
            Inner::Bump(bump) => bump,
            Inner::FreeList(free_list) => free_list,
        }
    }
}

impl Allocator for ArenaAllocator<'_> {
    fn allocate(&mut self, size: usize, alignment: usize) -> AllocResult<Allocation> {
        self.as_dyn_mut().allocate(size, alignment)
    }

    fn deallocate(&mut self, allocation: Allocation) {
        self.as_dyn_mut().deallocate(allocation);
    }

    fn arena(&self) -> &[u8] {
        self.as_dyn().arena()
    }

    fn arena_mut(&mut self) -> &mut [u8] {
        self.as_dyn_mut().arena_mut()
    }

    fn used_memory(&self) -> usize {
        self.as_dyn().used_memory()
    }

    fn num_allocations(&self) -> usize {
        self.as_dyn().num_allocations()
    }

    fn default_alignment(&self) -> usize {
        self.default_alignment
    }
}
