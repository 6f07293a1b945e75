//! Embedding backends.
//!
//! `FastEmbedClipBackend` runs CLIP locally through ONNX; `ClipServiceBackend`
//! calls a remote CLIP HTTP service. Both produce 512-dim vectors in one
//! shared text/image space.

pub mod clip_service;
pub mod fastembed;
