pub mod imm;
pub mod op;
