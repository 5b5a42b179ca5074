//! ソフトスイッチテーブル
//!
//! I/Oアドレスごとに読み取りトラップ・書き込みトラップを登録する。
//! トラップはクロージャではなくタグ付きの値で、`Memory` が一箇所でディスパッチする。
//! テーブルは起動時に一度だけ構築し、以後は参照のみ。

use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::memory::{AppleModel, BankMode, MemMode};

/// ソフトスイッチを登録できる最小アドレス（これ未満はRAM）
pub const SWITCH_SPACE_START: u16 = 0xC000;

/// ステータスバイト: bit7のみ意味を持つ
pub const STATUS_ON: u8 = 0x80;
pub const STATUS_OFF: u8 = 0x00;

/// トラップが操作するモードビット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlag {
    /// 補助メモリ/ROM選択 (`MemMode`)
    Mem(MemMode),
    /// ゼロページ・ランゲージカード選択 (`BankMode`)
    Bank(BankMode),
}

/// トラップの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTrap {
    /// フラグが立っていれば $80、そうでなければ $00 を返す
    Probe(ModeFlag),
    /// フラグを立てて $80 を返す
    Set(ModeFlag),
    /// フラグを落として $00 を返す
    Unset(ModeFlag),
    /// $C080-$C08F ランゲージカード制御
    LanguageCard,
}

/// 1アドレス分の登録内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchEntry {
    pub read: Option<SwitchTrap>,
    pub write: Option<SwitchTrap>,
}

impl SwitchEntry {
    pub fn read_only(trap: SwitchTrap) -> Self {
        SwitchEntry { read: Some(trap), write: None }
    }

    pub fn write_only(trap: SwitchTrap) -> Self {
        SwitchEntry { read: None, write: Some(trap) }
    }

    /// 読み書きどちらでも同じトラップを起動する
    pub fn read_write(trap: SwitchTrap) -> Self {
        SwitchEntry { read: Some(trap), write: Some(trap) }
    }
}

/// アドレス → トラップ のマッピング
#[derive(Debug, Clone, Default)]
pub struct SwitchTable {
    entries: HashMap<u16, SwitchEntry>,
}

impl SwitchTable {
    pub fn new() -> Self {
        SwitchTable { entries: HashMap::new() }
    }

    /// モデルに応じたテーブルを構築
    pub fn for_model(model: AppleModel) -> Self {
        use ModeFlag::{Bank, Mem};
        use SwitchTrap::{Probe, Set, Unset};

        let mut table = SwitchTable::new();

        // 表示ページ選択は全モデル共通（80STOREがなければメモリには影響しない）
        table.insert(0xC054, SwitchEntry::read_write(Unset(Mem(MemMode::PAGE2))));
        table.insert(0xC055, SwitchEntry::read_write(Set(Mem(MemMode::PAGE2))));
        table.insert(0xC056, SwitchEntry::read_write(Unset(Mem(MemMode::HIRES))));
        table.insert(0xC057, SwitchEntry::read_write(Set(Mem(MemMode::HIRES))));

        table.insert_range(0xC080..=0xC08F, SwitchEntry::read_write(SwitchTrap::LanguageCard));

        if !model.is_iie() {
            return table;
        }

        // Apple IIe 80列カード/補助メモリスイッチ（書き込みで動作）
        let write_pairs: [(u16, SwitchTrap, SwitchTrap); 6] = [
            (0xC000, Unset(Mem(MemMode::STORE_80)), Set(Mem(MemMode::STORE_80))),
            (0xC002, Unset(Mem(MemMode::READ_AUX)), Set(Mem(MemMode::READ_AUX))),
            (0xC004, Unset(Mem(MemMode::WRITE_AUX)), Set(Mem(MemMode::WRITE_AUX))),
            // $C006: SETSLOTCXROM, $C007: SETINTCXROM
            (0xC006, Set(Mem(MemMode::SLOT_CX_ROM)), Unset(Mem(MemMode::SLOT_CX_ROM))),
            (0xC008, Unset(Bank(BankMode::AUXILIARY)), Set(Bank(BankMode::AUXILIARY))),
            // $C00A: SETINTC3ROM, $C00B: SETSLOTC3ROM
            (0xC00A, Unset(Mem(MemMode::SLOT_C3_ROM)), Set(Mem(MemMode::SLOT_C3_ROM))),
        ];
        for (addr, even, odd) in write_pairs {
            table.insert(addr, SwitchEntry::write_only(even));
            table.insert(addr + 1, SwitchEntry::write_only(odd));
        }

        // ステータス読み取り
        let probes: [(u16, ModeFlag); 10] = [
            (0xC011, Bank(BankMode::BANK2)),
            (0xC012, Bank(BankMode::READ_RAM)),
            (0xC013, Mem(MemMode::READ_AUX)),
            (0xC014, Mem(MemMode::WRITE_AUX)),
            (0xC015, Mem(MemMode::SLOT_CX_ROM)),
            (0xC016, Bank(BankMode::AUXILIARY)),
            (0xC017, Mem(MemMode::SLOT_C3_ROM)),
            (0xC018, Mem(MemMode::STORE_80)),
            (0xC01C, Mem(MemMode::PAGE2)),
            (0xC01D, Mem(MemMode::HIRES)),
        ];
        for (addr, flag) in probes {
            table.insert(addr, SwitchEntry::read_only(Probe(flag)));
        }

        // $CFFF へのアクセスで拡張ROMを切り離す
        table.insert(0xCFFF, SwitchEntry::read_write(Unset(Mem(MemMode::EXP_ROM))));

        table
    }

    /// 1アドレス登録
    ///
    /// RAM領域への登録は構成ミスなので起動時にパニックする。
    pub fn insert(&mut self, address: u16, entry: SwitchEntry) {
        assert!(
            address >= SWITCH_SPACE_START,
            "soft switch ${:04X} is inside the RAM range",
            address
        );
        self.entries.insert(address, entry);
    }

    /// 範囲登録（空または逆順の範囲は構成ミス）
    pub fn insert_range(&mut self, range: RangeInclusive<u16>, entry: SwitchEntry) {
        assert!(
            !range.is_empty(),
            "malformed soft switch range ${:04X}-${:04X}",
            range.start(),
            range.end()
        );
        for address in range {
            self.insert(address, entry);
        }
    }

    pub fn get(&self, address: u16) -> Option<&SwitchEntry> {
        self.entries.get(&address)
    }

    #[inline]
    pub fn read_trap(&self, address: u16) -> Option<SwitchTrap> {
        self.entries.get(&address).and_then(|e| e.read)
    }

    #[inline]
    pub fn write_trap(&self, address: u16) -> Option<SwitchTrap> {
        self.entries.get(&address).and_then(|e| e.write)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iie_table() {
        let table = SwitchTable::for_model(AppleModel::AppleIIe);

        assert_eq!(
            table.write_trap(0xC003),
            Some(SwitchTrap::Set(ModeFlag::Mem(MemMode::READ_AUX)))
        );
        assert_eq!(table.read_trap(0xC003), None);
        assert_eq!(
            table.read_trap(0xC016),
            Some(SwitchTrap::Probe(ModeFlag::Bank(BankMode::AUXILIARY)))
        );
        assert_eq!(table.write_trap(0xC016), None);
        for addr in 0xC080..=0xC08F {
            assert_eq!(table.read_trap(addr), Some(SwitchTrap::LanguageCard));
            assert_eq!(table.write_trap(addr), Some(SwitchTrap::LanguageCard));
        }
    }

    #[test]
    fn test_ii_plus_table_has_no_aux_switches() {
        let table = SwitchTable::for_model(AppleModel::AppleIIPlus);
        assert!(table.get(0xC003).is_none());
        assert!(table.get(0xC013).is_none());
        assert!(table.get(0xCFFF).is_none());
        assert!(table.get(0xC055).is_some());
        // 4 display + 16 language card
        assert_eq!(table.len(), 20);
    }

    #[test]
    fn test_insert_range() {
        let mut table = SwitchTable::new();
        let entry = SwitchEntry::read_only(SwitchTrap::Probe(ModeFlag::Mem(MemMode::HIRES)));
        table.insert_range(0xC0E0..=0xC0E3, entry);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(0xC0E3), Some(&entry));
        assert!(table.get(0xC0E4).is_none());
    }

    #[test]
    #[should_panic(expected = "malformed soft switch range")]
    fn test_reversed_range_panics() {
        let mut table = SwitchTable::new();
        table.insert_range(0xC010..=0xC000, SwitchEntry::default());
    }

    #[test]
    #[should_panic(expected = "inside the RAM range")]
    fn test_ram_address_panics() {
        let mut table = SwitchTable::new();
        table.insert(0x0400, SwitchEntry::default());
    }
}
