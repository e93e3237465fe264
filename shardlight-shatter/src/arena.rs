use crate::{generate_broken_glass, FractureParams, Shard, ShatterError};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rand::Rng;

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct ShardId {
    pub variant: usize,
    pub shard: usize,
}

/// Independently fractured variants of the pane, indexed by [`ShardId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardArena {
    variants: Vec<Vec<Shard>>,
}

impl ShardArena {
    /// Fractures `count` variants, one after the other from the same generator.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        params: &FractureParams,
        count: usize,
    ) -> Result<Self, ShatterError> {
        let variants = (0..count)
            .map(|_| generate_broken_glass(rng, params))
            .collect::<Result<Vec<_>, _>>()?;
        let arena = Self { variants };
        debug!(
            "Generated {} variants with {} shards in total.",
            arena.variant_count(),
            arena.shard_count()
        );
        Ok(arena)
    }

    pub fn from_variants(variants: Vec<Vec<Shard>>) -> Self {
        Self { variants }
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn shard_count(&self) -> usize {
        self.variants.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn variant(&self, variant: usize) -> Option<&[Shard]> {
        self.variants.get(variant).map(Vec::as_slice)
    }

    pub fn get(&self, id: ShardId) -> Option<&Shard> {
        self.variants.get(id.variant)?.get(id.shard)
    }

    /// All shards, variant by variant.
    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &Shard)> + '_ {
        self.variants.iter().enumerate().flat_map(|(variant, shards)| {
            shards
                .iter()
                .enumerate()
                .map(move |(shard, s)| (ShardId { variant, shard }, s))
        })
    }

    pub fn clear(&mut self) {
        self.variants.clear();
    }
}
