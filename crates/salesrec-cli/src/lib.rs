//! Library surface for the salesrec command line tool, split out so the
//! HTTP router and config plumbing stay testable without spawning the
//! binary.
pub mod prepare;
pub mod serve;
pub mod train;
