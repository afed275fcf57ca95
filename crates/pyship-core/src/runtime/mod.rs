pub(crate) mod effects;
pub(crate) mod process;
pub(crate) mod python;
