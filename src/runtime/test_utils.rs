//! Test utilities for runtime testing
//!
//! `ExecutorTest` builds a module, validates a straight-line instruction
//! sequence against it and then executes the sequence on a fresh store, so
//! every runtime test also exercises the validator on the same code.
