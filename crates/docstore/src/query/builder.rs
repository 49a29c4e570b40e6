//! Query plan: filter, ordering, paging and partition scope.

use crate::query::expr::Filter;
use crate::store::PartitionKey;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Single ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// A query over one document type.
///
/// Built fresh per call and consumed by the repository; plans are never
/// cached because filters carry caller-supplied values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    filter: Option<Filter>,
    order: Option<OrderBy>,
    skip: Option<u32>,
    take: Option<u32>,
    partition_key: Option<PartitionKey>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter. Repeated calls are combined with AND.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Order ascending by a field. Only one ordering key is kept; the last call wins.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Order descending by a field. Only one ordering key is kept; the last call wins.
    pub fn order_by_descending(mut self, field: impl Into<String>) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }

    pub fn partition_key(mut self, partition_key: impl Into<PartitionKey>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_partition_key(mut self, partition_key: Option<PartitionKey>) -> Self {
        self.partition_key = partition_key;
        self
    }

    pub fn filter_ref(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn order(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    pub fn skip_count(&self) -> Option<u32> {
        self.skip
    }

    pub fn take_count(&self) -> Option<u32> {
        self.take
    }

    pub fn partition(&self) -> Option<&PartitionKey> {
        self.partition_key.as_ref()
    }

    /// Whether the plan needs server-side ordering or offset paging, which the
    /// plain filter pushdown cannot express.
    pub fn requires_compiled_paging(&self) -> bool {
        self.order.is_some() || self.skip.is_some() || self.take.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::field;

    #[test]
    fn test_filters_combine_with_and() {
        let query = DocumentQuery::new()
            .filter(field("A").eq(1))
            .filter(field("B").eq(2));

        assert_eq!(
            query.filter_ref(),
            Some(&field("A").eq(1).and(field("B").eq(2)))
        );
    }

    #[test]
    fn test_last_ordering_wins() {
        let query = DocumentQuery::new().order_by("Name").order_by_descending("CreatedAt");
        let order = query.order().unwrap();
        assert_eq!(order.field, "CreatedAt");
        assert_eq!(order.direction, SortDirection::Descending);
    }

    #[test]
    fn test_paging_or_ordering_needs_compiled_query() {
        assert!(!DocumentQuery::new().filter(field("A").eq(1)).requires_compiled_paging());
        assert!(DocumentQuery::new().take(5).requires_compiled_paging());
        assert!(DocumentQuery::new().skip(5).requires_compiled_paging());
        assert!(DocumentQuery::new().order_by("Name").requires_compiled_paging());
    }
}
