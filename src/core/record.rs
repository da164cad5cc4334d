//! Per-entity aggregate records.

use indexmap::IndexMap;

use super::table::{Cell, Table, TableError};

/// Mapping from entity (subject, group or condition code) to named
/// statistics, filled in one field at a time.
///
/// Entities and fields keep their first-insertion order. An absent value
/// (`None`) marks a combination with no data and is written as an empty cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    index_name: String,
    entities: IndexMap<String, IndexMap<String, Option<f64>>>,
}

impl AggregateTable {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            entities: IndexMap::new(),
        }
    }

    /// Name of the entity column.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Register an entity without any fields.
    pub fn ensure_entity(&mut self, entity: &str) {
        if !self.entities.contains_key(entity) {
            self.entities.insert(entity.to_string(), IndexMap::new());
        }
    }

    /// Set one field of one entity, overwriting any previous value.
    pub fn set(&mut self, entity: &str, field: impl Into<String>, value: Option<f64>) {
        self.ensure_entity(entity);
        if let Some(fields) = self.entities.get_mut(entity) {
            fields.insert(field.into(), value);
        }
    }

    /// Value of a field; `None` when absent or never set.
    pub fn get(&self, entity: &str, field: &str) -> Option<f64> {
        self.entities
            .get(entity)
            .and_then(|fields| fields.get(field))
            .copied()
            .flatten()
    }

    pub fn contains(&self, entity: &str, field: &str) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|fields| fields.contains_key(field))
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Union of all field names in first-insertion order.
    pub fn fields(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for fields in self.entities.values() {
            for name in fields.keys() {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        out
    }

    /// One entity's values over [`fields`](Self::fields), absent where unset.
    pub fn series(&self, entity: &str) -> Vec<Option<f64>> {
        let fields = self.fields();
        fields.iter().map(|f| self.get(entity, f)).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Flatten into a table whose first column is the entity.
    ///
    /// Fails if a field shares the entity column's name.
    pub fn to_table(&self) -> Result<Table, TableError> {
        let fields = self.fields();
        let mut names = Vec::with_capacity(fields.len() + 1);
        names.push(self.index_name.clone());
        names.extend(fields.iter().cloned());

        let rows = self
            .entities
            .iter()
            .map(|(entity, values)| {
                let mut row = Vec::with_capacity(names.len());
                row.push(Cell::Text(entity.clone()));
                row.extend(
                    fields
                        .iter()
                        .map(|f| Cell::from(values.get(f).copied().flatten())),
                );
                row
            })
            .collect();

        Table::from_rows(names, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_fill() {
        let mut agg = AggregateTable::new("Subject");
        agg.set("S01", "Anode_e0", Some(1.5));
        agg.set("S02", "Cathode_e0", Some(2.0));
        agg.set("S01", "Cathode_e0", None);

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.fields(), vec!["Anode_e0", "Cathode_e0"]);
        assert_eq!(agg.get("S01", "Anode_e0"), Some(1.5));
        assert_eq!(agg.get("S01", "Cathode_e0"), None);
        assert!(agg.contains("S01", "Cathode_e0"));
        assert!(!agg.contains("S02", "Anode_e0"));
        assert_eq!(agg.series("S02"), vec![None, Some(2.0)]);
    }

    #[test]
    fn test_to_table_puts_entity_first() {
        let mut agg = AggregateTable::new("Subject");
        agg.set("S01", "mean", Some(3.0));
        agg.ensure_entity("S02");

        let table = agg.to_table().unwrap();
        assert_eq!(table.column_names()[0], "Subject");
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("mean").unwrap(), &[Cell::Float(3.0), Cell::Empty]);
    }
}
