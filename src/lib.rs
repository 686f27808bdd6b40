pub mod builder;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod credentials;
pub mod docs;
pub mod inspect;
pub mod packer;
pub mod project;
pub mod publish;
pub mod registry;
pub mod scaffold;
pub mod util;
pub mod xnode;
