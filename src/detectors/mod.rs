// Detectors: trait-based abstraction over the model families.
//
// The Detector trait defines the interface. Each model family (CLIP
// zero-shot violence, YOLO weapons, ViT explicit content) implements it, so
// the orchestrator never depends on a concrete model.

pub mod characteristics;
pub mod clip;
pub mod download;
pub mod nsfw;
pub mod onnx;
pub mod traits;
pub mod warmup;
pub mod yolo;
