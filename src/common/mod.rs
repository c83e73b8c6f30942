// Common Definitions
//
// Types shared across the catalog and the query planner.

pub mod types;
