pub mod builders;
pub mod nodes_state;

pub use builders::{
    build_collection_state, build_group_state, build_token_state, find_or_register_token_state,
    recompute_state_resolvability, resolved_token_value,
};
pub use nodes_state::TreeNodesState;
