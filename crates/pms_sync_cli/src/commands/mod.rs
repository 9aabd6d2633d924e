pub(crate) mod auth;
pub(crate) mod entities;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod operator;
pub(crate) mod run;
pub(crate) mod runs;
pub(crate) mod serve;
pub(crate) mod shared;
