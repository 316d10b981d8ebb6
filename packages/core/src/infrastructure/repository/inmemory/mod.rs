//! InMemory 実装

mod room_summary;

pub use room_summary::InMemoryRoomSummaryRepository;
