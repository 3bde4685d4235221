//! Safe extraction of repository tarballs.

mod extract;
mod links;
mod path;
mod tar_gz;

pub(crate) use tar_gz::{extract_tar_gz_subtree, list_tar_gz_subtree};
