#[path = "property/aggregation.rs"]
mod aggregation;

#[path = "property/override_isolation.rs"]
mod override_isolation;

#[path = "property/drafts.rs"]
mod drafts;

#[path = "property/inputs_hash.rs"]
mod inputs_hash;
