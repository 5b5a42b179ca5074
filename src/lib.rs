//! A2CORE - Apple II memory and Disk II core in Rust
//!
//! Apple II エミュレータのハードウェア状態部分:
//! - バイトセグメント（メイン/補助RAM、ROM、ディスクデータ）
//! - ソフトスイッチテーブルとバンク切り替えメモリ
//! - Disk II ドライブのヘッド/ステッパー状態機械
//! - DSK/DO/PO/NIB イメージのロードとニブル化

pub mod segment;
pub mod bus;
pub mod memory;
pub mod switches;
pub mod disk;
pub mod nibble;
pub mod disk_log;
pub mod config;
pub mod savestate;
pub mod apple2;

pub use apple2::Apple2;
pub use bus::MemoryBus;
pub use disk::{DiskError, Drive, ImageType};
pub use memory::{AppleModel, BankMode, MemMode, Memory};
pub use segment::{Segment, SegmentError};
