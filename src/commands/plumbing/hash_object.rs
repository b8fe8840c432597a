use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{GitObject, ObjectBox};
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;

impl Repository {
    pub fn hash_object(&mut self, object_path: &str, kind: ObjectType, write: bool) -> anyhow::Result<()> {
        let data = std::fs::read(self.path().join(object_path))
            .with_context(|| format!("could not open '{object_path}' for reading"))?;
        let object = GitObject::new(kind, Bytes::from(data));

        // refuse to hash a tree or commit that could never be read back
        ObjectBox::try_from(object.clone())
            .with_context(|| format!("'{object_path}' is not a valid {kind} object"))?;

        if write {
            self.ensure_initialized()?;
            self.database().put(&object)?;
        }

        writeln!(self.writer(), "{}", object.hash())?;

        Ok(())
    }
}
