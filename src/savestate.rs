//! セーブステート機能
//!
//! メモリとドライブの状態を保存・復元する

use serde::{Deserialize, Serialize};

use crate::disk::{Drive, DriveMode, ImageType, MAX_STEPS, NIB_SIZE, PHYS_TRACK_LEN};
use crate::memory::{BankMode, MemMode, Memory, RAM_SIZE};
use crate::segment::Segment;

/// メモリの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MemoryState {
    pub main: Vec<u8>,          // メインRAM (64KB)
    pub aux: Vec<u8>,           // 補助RAM (64KB)
    pub mem_mode: u8,
    pub bank_mode: u8,
    pub lc_prewrite: bool,
}

impl MemoryState {
    pub fn capture(memory: &Memory) -> Self {
        MemoryState {
            main: memory.main.as_slice().to_vec(),
            aux: memory.aux.as_slice().to_vec(),
            mem_mode: memory.mem_mode.bits(),
            bank_mode: memory.bank_mode.bits(),
            lc_prewrite: memory.lc_prewrite(),
        }
    }

    pub fn restore(&self, memory: &mut Memory) -> Result<(), &'static str> {
        if self.main.len() != RAM_SIZE || self.aux.len() != RAM_SIZE {
            return Err("Invalid RAM size in save state");
        }
        let bank_mode =
            BankMode::from_bits(self.bank_mode).ok_or("Invalid bank mode in save state")?;

        memory.main = Segment::from_bytes(&self.main);
        memory.aux = Segment::from_bytes(&self.aux);
        memory.mem_mode = MemMode::from_bits_retain(self.mem_mode);
        memory.bank_mode = bank_mode;
        memory.set_lc_prewrite(self.lc_prewrite);
        Ok(())
    }
}

/// ディスクドライブの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DriveState {
    pub phase: usize,
    pub latch: u8,
    pub track_pos: usize,
    pub sector_pos: usize,
    pub image_type: ImageType,
    pub mode: DriveMode,
    pub online: bool,
    pub write_protect: bool,
    pub locked: bool,
    pub data: Option<Vec<u8>>,  // ニブル化データ
    pub image: Option<Vec<u8>>, // ロード時のイメージ
}

impl DriveState {
    pub fn capture(drive: &Drive) -> Self {
        DriveState {
            phase: drive.phase,
            latch: drive.latch,
            track_pos: drive.track_pos,
            sector_pos: drive.sector_pos,
            image_type: drive.image_type,
            mode: drive.mode,
            online: drive.online,
            write_protect: drive.write_protect,
            locked: drive.locked,
            data: drive.data.as_ref().map(|s| s.as_slice().to_vec()),
            image: drive.image.as_ref().map(|s| s.as_slice().to_vec()),
        }
    }

    /// ヘッド位置と不変条件を検証してからドライブに戻す
    pub fn restore(&self, drive: &mut Drive) -> Result<(), &'static str> {
        if self.phase > 4 {
            return Err("Invalid stepper phase in save state");
        }
        if self.track_pos > MAX_STEPS || self.sector_pos >= PHYS_TRACK_LEN {
            return Err("Invalid head position in save state");
        }
        if self.data.as_ref().is_some_and(|d| d.len() != NIB_SIZE) {
            return Err("Invalid disk data size in save state");
        }
        if self.image.as_ref().is_some_and(|i| i.len() != self.image_type.image_size()) {
            return Err("Invalid disk image size in save state");
        }

        drive.phase = self.phase;
        drive.latch = self.latch;
        drive.track_pos = self.track_pos;
        drive.sector_pos = self.sector_pos;
        drive.image_type = self.image_type;
        drive.mode = self.mode;
        drive.online = self.online;
        drive.write_protect = self.write_protect;
        drive.locked = self.locked;
        drive.data = self.data.as_deref().map(Segment::from_bytes);
        drive.image = self.image.as_deref().map(Segment::from_bytes);
        Ok(())
    }
}

/// 完全な状態
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SaveState {
    pub version: u32,           // セーブフォーマットのバージョン
    pub memory: MemoryState,
    pub drives: [DriveState; 2],
}

impl SaveState {
    pub const CURRENT_VERSION: u32 = 1;
}
