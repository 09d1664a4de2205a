pub mod anchor;
pub mod canonicalize;
pub mod check;
pub mod contract_check;
pub mod leaf_check;
pub mod tree_check;
