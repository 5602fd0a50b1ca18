//! Builders for synthetic archives and scene files, shared by the
//! integration tests. They write the same byte layouts the crate parses,
//! independently reimplemented so encoder bugs cannot cancel out decoder
//! bugs.

pub mod test_utils;
