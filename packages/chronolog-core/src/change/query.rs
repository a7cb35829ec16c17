use crate::region::{BlockPos, Region};

/// World, region and row limit of a history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    region: Region,
    limit: Option<usize>,
}

impl ChangeQuery {
    /// History of a single cell.
    pub fn at(world: impl Into<String>, pos: BlockPos) -> Self {
        Self::in_region(Region::point(world, pos))
    }

    pub fn in_region(region: Region) -> Self {
        Self {
            region,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn world(&self) -> &str {
        self.region.world()
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Explicit limit, or `default` when none was set.
    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_query() {
        let query = ChangeQuery::at("overworld", BlockPos::new(3, 4, 5));
        assert_eq!(query.region().volume(), 1);
        assert_eq!(query.limit_or(100), 100);
        assert_eq!(query.limit(7).limit_or(100), 7);
    }
}
