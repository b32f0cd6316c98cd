use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::debug;

use greenhouse_node::sequence::{SequenceStore, StoreError};

const NAMESPACE: &str = "telemetry";
const KEY: &str = "seq";

/// Sequence counter kept in NVS so it survives deep sleep and power loss.
pub struct NvsSequence {
    nvs: EspNvs<NvsDefault>,
}

impl NvsSequence {
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl SequenceStore for NvsSequence {
    fn next(&mut self) -> Result<u32, StoreError> {
        let current = self
            .nvs
            .get_u32(KEY)
            .map_err(|err| StoreError(err.to_string()))?
            .unwrap_or(0);
        self.nvs
            .set_u32(KEY, current.wrapping_add(1))
            .map_err(|err| StoreError(err.to_string()))?;
        debug!("Sequence {current} handed out");
        Ok(current)
    }
}
