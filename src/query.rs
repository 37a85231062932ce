// Immutable collection + filter-chain descriptors

use crate::filter::Filter;
use crate::record::DocumentData;
use crate::reference::{CollectionReference, Reference};

/// A collection plus an ordered list of ANDed filter clauses
///
/// Adding a clause yields a new `Query`; the receiver is left untouched.
#[derive(Debug, Clone)]
pub struct Query {
    collection: CollectionReference,
    filters: Vec<Filter>,
}

impl Query {
    /// Unfiltered query over a whole collection
    pub fn new(collection: &CollectionReference) -> Self {
        Self {
            collection: collection.clone(),
            filters: Vec::new(),
        }
    }

    /// A new query with `filter` appended
    pub fn filter(&self, filter: Filter) -> Self {
        let mut filters = self.filters.clone();
        filters.push(filter);
        Self {
            collection: self.collection.clone(),
            filters,
        }
    }

    pub fn collection(&self) -> &CollectionReference {
        &self.collection
    }

    /// Clauses in the order they were added
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// True if `data` satisfies every clause
    pub fn matches(&self, data: Option<&DocumentData>) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

impl From<&CollectionReference> for Query {
    fn from(collection: &CollectionReference) -> Self {
        Query::new(collection)
    }
}

impl From<CollectionReference> for Query {
    fn from(collection: CollectionReference) -> Self {
        Self {
            collection,
            filters: Vec::new(),
        }
    }
}

impl From<&Query> for Query {
    fn from(query: &Query) -> Self {
        query.clone()
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.collection.id())?;
        for (i, filter) in self.filters.iter().enumerate() {
            let joiner = if i == 0 { " where " } else { " and " };
            write!(f, "{}{}", joiner, filter)?;
        }
        Ok(())
    }
}

/// Build a query over `collection` with the given clauses
pub fn query<I>(collection: &CollectionReference, filters: I) -> Query
where
    I: IntoIterator<Item = Filter>,
{
    Query {
        collection: collection.clone(),
        filters: filters.into_iter().collect(),
    }
}
