use ahash::HashMap;
use tessera_common::{Error, Result};
use tessera_directory::Directory;

use crate::{Features, FieldId, FlushState};

/// Static description of a term-indexed field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMeta {
    pub id: FieldId,
    pub name: String,
    pub features: Features,
}

impl FieldMeta {
    pub fn new(id: FieldId, name: impl Into<String>, features: Features) -> FieldMeta {
        FieldMeta {
            id,
            name: name.into(),
            features,
        }
    }
}

/// The fields of one segment, addressable by id and by name.
#[derive(Clone, Debug, Default)]
pub struct FieldsMeta {
    fields: Vec<FieldMeta>,
    by_name: HashMap<String, usize>,
    features: Features,
}

impl FieldsMeta {
    pub fn new(fields: Vec<FieldMeta>) -> Result<FieldsMeta> {
        let mut by_name = HashMap::default();
        let mut features = Features::empty();
        for (i, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(Error::invalid_arg(
                    "fields",
                    format!("duplicate field name '{}'", field.name),
                ));
            }
            features |= field.features;
        }
        Ok(FieldsMeta {
            fields,
            by_name,
            features,
        })
    }

    /// Drains a prepared reader.
    pub fn read_from(reader: &mut dyn FieldMetaReader) -> Result<FieldsMeta> {
        let count = reader.begin()?;
        let mut fields = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let mut field = FieldMeta::default();
            reader.read(&mut field)?;
            fields.push(field);
        }
        reader.end()?;
        FieldsMeta::new(fields)
            .map_err(|e| Error::invalid_format("field meta", e.to_string()))
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn find(&self, name: &str) -> Option<&FieldMeta> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Union of the features of all fields.
    pub fn features(&self) -> Features {
        self.features
    }
}

/// Persists field descriptors in id order, starting at `field_limits::MIN`.
pub trait FieldMetaWriter: Send {
    fn prepare(&mut self, state: &FlushState) -> Result<()>;

    fn write(&mut self, id: FieldId, name: &str, features: Features) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

pub trait FieldMetaReader: Send {
    fn prepare(&mut self, dir: &dyn Directory, segment: &str) -> Result<()>;

    /// Returns the number of fields and positions the cursor at the first one.
    fn begin(&mut self) -> Result<usize>;

    /// Reads the next field, in write order.
    fn read(&mut self, field: &mut FieldMeta) -> Result<()>;

    fn end(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let fields = FieldsMeta::new(vec![
            FieldMeta::new(0, "title", Features::FREQUENCY | Features::POSITION),
            FieldMeta::new(1, "tag", Features::empty()),
        ])
        .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get(1).unwrap().name, "tag");
        assert_eq!(fields.find("title").unwrap().id, 0);
        assert!(fields.find("body").is_none());
        assert!(fields.get(7).is_none());
        assert_eq!(fields.features(), Features::FREQUENCY | Features::POSITION);
    }

    #[test]
    fn test_duplicate_name() {
        let e = FieldsMeta::new(vec![
            FieldMeta::new(0, "a", Features::empty()),
            FieldMeta::new(1, "a", Features::empty()),
        ])
        .unwrap_err();
        assert!(e.to_string().contains("duplicate"));
    }
}
