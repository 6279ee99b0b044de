//! Proptest strategies for covdb property-based testing.
//!
//! Names are drawn from small fixed pools so independently generated
//! databases overlap, which is what exercises matching rather than adding.

pub mod strategies;

pub use strategies::{
    strategy_bin_name, strategy_coverpoint, strategy_covergroup, strategy_db_spec,
    strategy_hit_count, strategy_instance, strategy_merge_options, strategy_test_names,
};
