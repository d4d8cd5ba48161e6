// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Filesystem access for the ls3 object storage server.
//!
//! Buckets map onto directories through [`BucketFs`], every request
//! works against a sandboxed [`FsView`], and listings walk the tree
//! through [`BucketIterator`].

pub mod bucket;
pub mod iter;
pub mod object;
pub mod view;

pub use bucket::BucketFs;
pub use iter::{BucketIterator, Contents};
pub use object::{clean_key, stat_object, ByteRange, Object};
pub use view::FsView;
