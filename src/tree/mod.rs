pub mod descriptor;
pub mod forest;
pub(crate) mod generator;
pub mod node;
pub mod tree;

pub use descriptor::{Descriptor, DescriptorParams};
pub use forest::{Forest, TreeView};
pub use node::{Func, Node, DOMAIN_EPS};
pub use tree::Tree;
