/// Raw row of the `records` table. Distinct from the flicker-types models to
/// keep the storage layer independent of any one value shape.
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub key: String,
    pub value: String,
    pub version: u64,
    pub updated_at: String,
}
