pub mod extensions;
pub mod node;
pub mod token;

pub use extensions::Extensions;
pub use node::{CollectionState, GroupState, NodeCommon, NodeKind, NodeRef};
pub use token::{AliasPart, PrimitivePart, TokenSlot, TokenState, UnresolvableTokenState};
