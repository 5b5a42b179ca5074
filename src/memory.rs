//! Apple II メモリサブシステム
//!
//! メイン/補助RAMのバンク切り替えとソフトスイッチを実装。
//! 読み取りと書き込みは独立に解決されるため、異なるセグメントを同時に指すことがある。

use serde::{Deserialize, Serialize};

use crate::bus::MemoryBus;
use crate::segment::Segment;
use crate::switches::{ModeFlag, SwitchTable, SwitchTrap, STATUS_OFF, STATUS_ON};

/// RAMセグメントのサイズ（64KB）
pub const RAM_SIZE: usize = 0x10000;
/// システムROM ($C000-$FFFF)
pub const ROM_SIZE: usize = 0x4000;
/// 周辺カードROM ($C000-$CFFF、スロットROMと拡張ROM)
pub const PERIPHERAL_ROM_SIZE: usize = 0x1000;

/// ROMとペリフェラル領域の基点
const ROM_BASE: u16 = 0xC000;

/// Apple IIのモデル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppleModel {
    AppleII,
    AppleIIPlus,
    AppleIIe,
    AppleIIeEnhanced,
}

impl AppleModel {
    pub fn is_iie(&self) -> bool {
        matches!(self, AppleModel::AppleIIe | AppleModel::AppleIIeEnhanced)
    }
}

bitflags::bitflags! {
    /// 補助メモリ・ROM選択モード
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MemMode: u8 {
        /// $0200-$BFFF の読み取りを補助メモリから
        const READ_AUX    = 0x01;
        /// $0200-$BFFF の書き込みを補助メモリへ
        const WRITE_AUX   = 0x02;
        /// PAGE2/HIRES を表示メモリの補助選択に使う。これがないと両者は無効
        const STORE_80    = 0x04;
        /// 80STORE時、$0400-$07FF を補助メモリに
        const PAGE2       = 0x08;
        /// 80STORE時、$2000-$3FFF もPAGE2に従う
        const HIRES       = 0x10;
        /// $C800-$CFFF を拡張ROMに
        const EXP_ROM     = 0x20;
        /// $C100-$C7FF を周辺カードROMに
        const SLOT_CX_ROM = 0x40;
        /// $C300-$C3FF のみ周辺カードROMに
        const SLOT_C3_ROM = 0x80;
    }
}

bitflags::bitflags! {
    /// ゼロページ・ランゲージカード選択モード
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BankMode: u8 {
        /// ALTZP: ゼロページ、スタック、ランゲージカードを補助メモリから
        const AUXILIARY = 0x01;
        /// $D000-$FFFF の読み取りをRAMから
        const READ_RAM  = 0x02;
        /// $D000-$FFFF への書き込みを許可
        const WRITE_RAM = 0x04;
        /// $D000-$DFFF はバンク2
        const BANK2     = 0x08;
    }
}

/// Apple IIメモリシステム
#[derive(Clone)]
pub struct Memory {
    pub main: Segment,
    pub aux: Segment,
    pub rom: Segment,
    pub peripheral: Segment,
    pub mem_mode: MemMode,
    pub bank_mode: BankMode,
    pub model: AppleModel,
    /// ランゲージカードの書き込み許可待ち（奇数アドレスを2回読むと書き込み可）
    lc_prewrite: bool,
    switches: SwitchTable,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new(AppleModel::AppleIIe)
    }
}

impl Memory {
    pub fn new(model: AppleModel) -> Self {
        let mut memory = Memory {
            main: Segment::new(RAM_SIZE),
            aux: Segment::new(RAM_SIZE),
            rom: Segment::new(ROM_SIZE),
            peripheral: Segment::new(PERIPHERAL_ROM_SIZE),
            mem_mode: MemMode::empty(),
            bank_mode: BankMode::empty(),
            model,
            lc_prewrite: false,
            switches: SwitchTable::for_model(model),
        };
        memory.rom.fill(0xFF);
        memory.peripheral.fill(0xFF);
        memory.reset();
        memory
    }

    /// 電源投入時のモードに戻す
    pub fn reset(&mut self) {
        self.mem_mode = Self::power_on_mode(self.model);
        self.bank_mode = BankMode::WRITE_RAM | BankMode::BANK2;
        self.lc_prewrite = false;
    }

    /// II/II+ には内蔵 $Cxxx ROM がないので、周辺カードROMが常に見える
    fn power_on_mode(model: AppleModel) -> MemMode {
        if model.is_iie() {
            MemMode::SLOT_CX_ROM
        } else {
            MemMode::SLOT_CX_ROM | MemMode::SLOT_C3_ROM | MemMode::EXP_ROM
        }
    }

    pub fn is_iie(&self) -> bool {
        self.model.is_iie()
    }

    pub fn lc_prewrite(&self) -> bool {
        self.lc_prewrite
    }

    pub(crate) fn set_lc_prewrite(&mut self, armed: bool) {
        self.lc_prewrite = armed;
    }

    pub fn switches(&self) -> &SwitchTable {
        &self.switches
    }

    /// ROMをロード
    ///
    /// 12KB:  $D000-$FFFF (Apple II/II+ ROM)
    /// 16KB:  $C000-$FFFF (フルROM)
    /// 20KB:  Apple II Plus ROM パッケージ（$0600: Disk II Boot ROM、$2000-$4FFF: Monitor）
    /// 32KB:  Apple IIe ROM（後半16KBがメインROM）
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), &'static str> {
        self.rom.fill(0xFF);
        match rom_data.len() {
            0x3000 => {
                self.rom
                    .copy_slice(0x1000, rom_data)
                    .map_err(|_| "ROM image does not fit")?;
            }
            0x4000 => {
                self.rom
                    .copy_slice(0, rom_data)
                    .map_err(|_| "ROM image does not fit")?;
            }
            0x5000 => {
                self.rom
                    .copy_slice(0x1000, &rom_data[0x2000..0x5000])
                    .map_err(|_| "ROM image does not fit")?;
                let mut boot_rom = [0u8; 256];
                boot_rom.copy_from_slice(&rom_data[0x0600..0x0700]);
                self.load_slot_rom(6, &boot_rom)?;
                log::debug!("Disk II Boot ROM extracted to $C600");
            }
            0x8000 => {
                self.rom
                    .copy_slice(0, &rom_data[0x4000..0x8000])
                    .map_err(|_| "ROM image does not fit")?;
            }
            _ => return Err("Unsupported ROM size"),
        }

        log::debug!(
            "Loaded {}KB ROM, reset vector ${:02X}{:02X}",
            rom_data.len() / 1024,
            self.rom.get(0x3FFD),
            self.rom.get(0x3FFC)
        );
        Ok(())
    }

    /// スロットROM（256バイト）を $Cs00 に配置
    pub fn load_slot_rom(&mut self, slot: usize, data: &[u8; 256]) -> Result<(), &'static str> {
        if !(1..=7).contains(&slot) {
            return Err("Invalid slot number");
        }
        self.peripheral
            .copy_slice(slot * 0x100, data)
            .map_err(|_| "Slot ROM does not fit")?;
        Ok(())
    }

    /// CPUから見た1バイト読み取り
    pub fn get(&mut self, address: u16) -> u8 {
        if address < ROM_BASE {
            let offset = address as usize;
            return if self.aux_selected(address, false) {
                self.aux.get(offset)
            } else {
                self.main.get(offset)
            };
        }

        if let Some(trap) = self.switches.read_trap(address) {
            return self.apply_read_trap(trap, address);
        }

        match address {
            0xC000..=0xC0FF => 0x00,
            0xC100..=0xCFFF => self.read_rom_window(address),
            _ => self.read_high(address),
        }
    }

    /// CPUから見た1バイト書き込み
    pub fn set(&mut self, address: u16, value: u8) {
        if address < ROM_BASE {
            let offset = address as usize;
            if self.aux_selected(address, true) {
                self.aux.set(offset, value);
            } else {
                self.main.set(offset, value);
            }
            return;
        }

        if let Some(trap) = self.switches.write_trap(address) {
            self.apply_write_trap(trap, address, value);
            return;
        }

        if address >= 0xD000 {
            self.write_high(address, value);
        }
        // $C000-$CFFF の未登録I/OとROMへの書き込みは捨てる
    }

    /// $0000-$BFFF が補助メモリを指すか
    fn aux_selected(&self, address: u16, write: bool) -> bool {
        let mode = self.mem_mode;
        let aux_flag = if write { MemMode::WRITE_AUX } else { MemMode::READ_AUX };

        match address {
            0x0000..=0x01FF => self.bank_mode.contains(BankMode::AUXILIARY),
            0x0400..=0x07FF if mode.contains(MemMode::STORE_80) => mode.contains(MemMode::PAGE2),
            0x2000..=0x3FFF if mode.contains(MemMode::STORE_80 | MemMode::HIRES) => {
                mode.contains(MemMode::PAGE2)
            }
            _ => mode.contains(aux_flag),
        }
    }

    /// $C100-$CFFF: 内蔵ROMか周辺カードROMか
    fn read_rom_window(&self, address: u16) -> u8 {
        let select = match address {
            0xC300..=0xC3FF => MemMode::SLOT_C3_ROM,
            0xC100..=0xC7FF => MemMode::SLOT_CX_ROM,
            _ => MemMode::EXP_ROM,
        };
        let offset = (address - ROM_BASE) as usize;

        if self.mem_mode.contains(select) {
            self.peripheral.get(offset)
        } else {
            self.rom.get(offset)
        }
    }

    /// ランゲージカードRAM上のオフセット
    ///
    /// バンク2の $D000-$DFFF はRAMセグメントの $C000-$CFFF に置く。
    fn lc_offset(&self, address: u16) -> usize {
        if address < 0xE000 && self.bank_mode.contains(BankMode::BANK2) {
            address as usize - 0x1000
        } else {
            address as usize
        }
    }

    fn read_high(&self, address: u16) -> u8 {
        if !self.bank_mode.contains(BankMode::READ_RAM) {
            return self.rom.get((address - ROM_BASE) as usize);
        }

        let offset = self.lc_offset(address);
        if self.bank_mode.contains(BankMode::AUXILIARY) {
            self.aux.get(offset)
        } else {
            self.main.get(offset)
        }
    }

    fn write_high(&mut self, address: u16, value: u8) {
        if !self.bank_mode.contains(BankMode::WRITE_RAM) {
            return;
        }

        let offset = self.lc_offset(address);
        if self.bank_mode.contains(BankMode::AUXILIARY) {
            self.aux.set(offset, value);
        } else {
            self.main.set(offset, value);
        }
    }

    /// フラグの状態
    pub fn is_set(&self, flag: ModeFlag) -> bool {
        match flag {
            ModeFlag::Mem(f) => self.mem_mode.intersects(f),
            ModeFlag::Bank(f) => self.bank_mode.intersects(f),
        }
    }

    fn update_flag(&mut self, flag: ModeFlag, on: bool) {
        match flag {
            ModeFlag::Mem(f) => {
                let before = self.mem_mode;
                self.mem_mode.set(f, on);
                if before != self.mem_mode {
                    log::debug!("MemMode {:?} -> {:?}", before, self.mem_mode);
                }
            }
            ModeFlag::Bank(f) => {
                let before = self.bank_mode;
                self.bank_mode.set(f, on);
                if before != self.bank_mode {
                    log::debug!("BankMode {:?} -> {:?}", before, self.bank_mode);
                }
            }
        }
    }

    /// 読み取りトラップを実行し、ステータスバイトを返す
    pub fn apply_read_trap(&mut self, trap: SwitchTrap, address: u16) -> u8 {
        match trap {
            SwitchTrap::Probe(flag) => {
                if self.is_set(flag) {
                    STATUS_ON
                } else {
                    STATUS_OFF
                }
            }
            SwitchTrap::Set(flag) => {
                self.update_flag(flag, true);
                STATUS_ON
            }
            SwitchTrap::Unset(flag) => {
                self.update_flag(flag, false);
                STATUS_OFF
            }
            SwitchTrap::LanguageCard => {
                self.language_card(address, false);
                0x00
            }
        }
    }

    /// 書き込みトラップを実行（書き込み値は使わない）
    pub fn apply_write_trap(&mut self, trap: SwitchTrap, address: u16, _value: u8) {
        match trap {
            SwitchTrap::Probe(_) => {}
            SwitchTrap::Set(flag) => self.update_flag(flag, true),
            SwitchTrap::Unset(flag) => self.update_flag(flag, false),
            SwitchTrap::LanguageCard => self.language_card(address, true),
        }
    }

    /// $C080-$C08F ランゲージカード制御
    ///
    /// bit3=0: バンク2、下位2ビットが0か3: RAM読み取り、
    /// 奇数アドレスの連続2回読み取りで書き込み許可、偶数アドレスで書き込み禁止。
    fn language_card(&mut self, address: u16, write: bool) {
        let n = address & 0x0F;
        let before = self.bank_mode;

        self.bank_mode.set(BankMode::BANK2, n & 0x08 == 0);
        self.bank_mode.set(BankMode::READ_RAM, matches!(n & 0x03, 0 | 3));

        if n & 0x01 == 0 {
            self.bank_mode.remove(BankMode::WRITE_RAM);
            self.lc_prewrite = false;
        } else if write {
            self.lc_prewrite = false;
        } else {
            if self.lc_prewrite {
                self.bank_mode.insert(BankMode::WRITE_RAM);
            }
            self.lc_prewrite = true;
        }

        if before != self.bank_mode {
            log::debug!("Language card ${:04X}: {:?} -> {:?}", address, before, self.bank_mode);
        }
    }
}

impl MemoryBus for Memory {
    fn read(&mut self, address: u16) -> u8 {
        self.get(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.set(address, value)
    }
}
