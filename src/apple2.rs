//! Apple II マシン
//!
//! メモリとディスクドライブを統合。モード状態はすべてこの構造体が所有するので、
//! 複数インスタンスが互いに干渉しない。

use crate::bus::MemoryBus;
use crate::config::Config;
use crate::disk::{DiskError, Drive, ImageType};
use crate::memory::{AppleModel, Memory};
use crate::savestate::{DriveState, MemoryState, SaveState};

/// ドライブ数（1スロット分）
pub const NUM_DRIVES: usize = 2;

/// Apple IIのメイン構造体
pub struct Apple2 {
    /// メモリシステム
    pub memory: Memory,
    /// ドライブ1と2
    pub drives: [Drive; NUM_DRIVES],
    /// ロード時に書き込み禁止にするか
    write_protect: bool,
}

/// メモリバスの実装
impl MemoryBus for Apple2 {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.get(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.set(address, value)
    }
}

impl Apple2 {
    /// 新しいインスタンスを作成
    pub fn new(model: AppleModel) -> Self {
        Apple2 {
            memory: Memory::new(model),
            drives: [Drive::new(), Drive::new()],
            write_protect: false,
        }
    }

    /// 設定から作成
    pub fn with_config(config: &Config) -> Self {
        let mut machine = Apple2::new(config.model);
        machine.write_protect = config.write_protect;
        log::debug!("Machine created: {:?}", config.model);
        machine
    }

    pub fn model(&self) -> AppleModel {
        self.memory.model
    }

    /// ROMをロード
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), &'static str> {
        self.memory.load_rom(rom_data)
    }

    /// ディスクイメージをロード
    pub fn load_disk(
        &mut self,
        drive: usize,
        data: &[u8],
        image_type: ImageType,
    ) -> Result<usize, DiskError> {
        let write_protect = self.write_protect;
        let target = self.drives.get_mut(drive).ok_or(DiskError::InvalidDrive(drive))?;

        let written = target.load(data, image_type)?;
        target.write_protect = write_protect;
        log::info!("Drive {}: loaded {:?} image ({} bytes)", drive + 1, image_type, written);
        Ok(written)
    }

    /// ディスクをイジェクト
    pub fn eject_disk(&mut self, drive: usize) {
        if let Some(target) = self.drives.get_mut(drive) {
            target.eject();
        }
    }

    pub fn drive(&self, drive: usize) -> Option<&Drive> {
        self.drives.get(drive)
    }

    pub fn drive_mut(&mut self, drive: usize) -> Option<&mut Drive> {
        self.drives.get_mut(drive)
    }

    /// リセット（モードを電源投入時に戻し、モーターを止める）
    pub fn reset(&mut self) {
        self.memory.reset();
        for drive in self.drives.iter_mut() {
            drive.online = false;
        }
    }

    /// 現在の状態をセーブステートとして取得
    pub fn save_state(&self) -> SaveState {
        SaveState {
            version: SaveState::CURRENT_VERSION,
            memory: MemoryState::capture(&self.memory),
            drives: [
                DriveState::capture(&self.drives[0]),
                DriveState::capture(&self.drives[1]),
            ],
        }
    }

    /// セーブステートから状態を復元
    ///
    /// 検証に失敗した場合は何も変更しない。
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), &'static str> {
        if state.version != SaveState::CURRENT_VERSION {
            return Err("Incompatible save state version");
        }

        let mut memory = self.memory.clone();
        let mut drives = self.drives.clone();
        state.memory.restore(&mut memory)?;
        for (drive, drive_state) in drives.iter_mut().zip(state.drives.iter()) {
            drive_state.restore(drive)?;
        }

        self.memory = memory;
        self.drives = drives;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{DOS_SIZE, PHYS_TRACK_LEN};
    use crate::memory::MemMode;

    #[test]
    fn test_instances_are_independent() {
        let mut a = Apple2::new(AppleModel::AppleIIe);
        let b = Apple2::new(AppleModel::AppleIIe);

        a.write(0xC003, 0);
        assert!(a.memory.mem_mode.contains(MemMode::READ_AUX));
        assert!(!b.memory.mem_mode.contains(MemMode::READ_AUX));
    }

    #[test]
    fn test_bus_round_trip() {
        let mut machine = Apple2::new(AppleModel::AppleIIe);
        for addr in (0x0000u16..0xC000).step_by(0x101) {
            let value = (addr >> 8) as u8 ^ addr as u8;
            machine.write(addr, value);
            assert_eq!(machine.read(addr), value);
        }
    }

    #[test]
    fn test_load_disk() {
        let config = Config { write_protect: true, ..Config::default() };
        let mut machine = Apple2::with_config(&config);

        assert_eq!(machine.load_disk(1, &vec![0u8; DOS_SIZE], ImageType::Dos33), Ok(DOS_SIZE));
        let drive = machine.drive(1).unwrap();
        assert!(drive.is_loaded());
        assert!(drive.write_protect);
        assert!(!machine.drive(0).unwrap().is_loaded());

        assert_eq!(
            machine.load_disk(2, &vec![0u8; DOS_SIZE], ImageType::Dos33),
            Err(DiskError::InvalidDrive(2))
        );

        machine.eject_disk(1);
        assert!(!machine.drive(1).unwrap().is_loaded());
    }

    #[test]
    fn test_save_and_load_state() {
        let mut machine = Apple2::new(AppleModel::AppleIIe);
        machine.load_disk(0, &vec![0u8; DOS_SIZE], ImageType::Dos33).unwrap();
        machine.write(0x0800, 0x99);
        machine.write(0xC005, 0); // RAMWRT
        machine.write(0x0800, 0x66);
        {
            let drive = machine.drive_mut(0).unwrap();
            drive.step_phase(0xC0E1);
            drive.step_phase(0xC0E3);
            drive.shift(33);
        }

        let state = machine.save_state();
        let json = serde_json::to_string(&state).unwrap();

        let mut restored = Apple2::new(AppleModel::AppleIIe);
        restored.load_state(&serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.memory.mem_mode, machine.memory.mem_mode);
        assert_eq!(restored.read(0x0800), 0x99);
        assert_eq!(restored.memory.aux.get(0x0800), 0x66);
        let drive = restored.drive(0).unwrap();
        assert_eq!(drive.phase(), 2);
        assert_eq!(drive.track_pos, 1);
        assert_eq!(drive.position(), 33);
        assert!(drive.position() < PHYS_TRACK_LEN);
    }

    #[test]
    fn test_load_state_rejects_version() {
        let mut machine = Apple2::new(AppleModel::AppleIIe);
        let mut state = machine.save_state();
        state.version = 99;
        assert!(machine.load_state(&state).is_err());
    }

    #[test]
    fn test_load_state_failure_leaves_machine_untouched() {
        let mut machine = Apple2::new(AppleModel::AppleIIe);
        machine.write(0x0300, 0x42);
        let mut state = Apple2::new(AppleModel::AppleIIe).save_state();
        state.drives[1].track_pos = 1000;

        assert!(machine.load_state(&state).is_err());
        assert_eq!(machine.read(0x0300), 0x42);
    }

    #[test]
    fn test_reset() {
        let mut machine = Apple2::new(AppleModel::AppleIIe);
        machine.drives[0].online = true;
        machine.write(0xC001, 0);
        machine.reset();
        assert!(!machine.drives[0].online);
        assert!(!machine.memory.mem_mode.contains(MemMode::STORE_80));
    }
}
