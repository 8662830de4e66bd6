use anyhow::Result;
use tracing::trace;

use crate::types::ObjectEntry;

use super::stage::Stage;

pub struct ObjectLister {
    base: Stage<ObjectEntry, ObjectEntry>,
}

impl ObjectLister {
    pub fn new(base: Stage<ObjectEntry, ObjectEntry>) -> Self {
        Self { base }
    }

    pub async fn list_source(&self, max_keys: i32) -> Result<()> {
        trace!("list source objects has started.");

        self.base
            .source
            .as_ref()
            .unwrap()
            .list_objects(self.base.sender.as_ref().unwrap(), max_keys)
            .await?;

        trace!("list source objects has been completed.");
        Ok(())
    }
}
