//! # Address Translator
//!
//! Owns one page directory page and `TABLES` page-table pages, fills them
//! with 4 KiB mappings and commits the directory to the MMU.
//!
//! ## Table slots
//!
//! Slot 0 always backs directory index 0 (the low 4 MiB, where the kernel,
//! its stack and the text buffer live). Slots `1..TABLES` are handed out to
//! other directory indices on first use. When a directory index needs a
//! table and none is left, the [`OverflowPolicy`] decides:
//!
//! | Policy | Effect |
//! |--------|--------|
//! | [`OverflowPolicy::Fold`] | Warn and map through directory index 0 instead. |
//! | [`OverflowPolicy::Reject`] | Fail with [`TranslateError::TablesExhausted`]. |
//!
//! With a single table and `Fold`, every mapping lands in the same table:
//! the addressable space is 4 MiB and two virtual addresses that differ only
//! in their directory index alias each other.

use crate::control::TranslationControl;
use crate::identity::identity_regions;
use crate::page_table::pd::{PageDirectory, PdIndex, Pde};
use crate::page_table::pt::{PageTable, Pte};
use crate::page_table::split_indices;
use crate::{PhysMapper, PhysMapperExt};
use kernel_info::boot::BootLayout;
use kernel_info::memory::TRANSLATION_TABLES;
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use log::{debug, info, warn};

/// Where the translator is in its life cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    /// Every directory and table entry is absent.
    Unmapped,
    /// At least one page is mapped; nothing committed to hardware yet.
    TablesBuilt,
    /// Paging is on. The tables can no longer be changed.
    TranslationActive,
}

/// What to do when a directory index has no page table left.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum OverflowPolicy {
    /// Warn and map the page through directory index 0 / table slot 0.
    #[default]
    Fold,
    /// Refuse the mapping.
    Reject,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("no frames to map")]
    EmptyFrameList,
    #[error("mapping at {base} ran past the end of the address space after {mapped} pages")]
    AddressOverflow { base: VirtualAddress, mapped: usize },
    #[error("no page table left for directory index {0}")]
    TablesExhausted(usize),
    #[error("translation is already active")]
    TranslationActive,
    #[error("the translation base has not been loaded")]
    BaseNotLoaded,
}

/// Builder and owner of a two-level translation structure.
pub struct Translator<'m, M: PhysMapper, const TABLES: usize = TRANSLATION_TABLES> {
    mapper: &'m M,
    directory: PhysicalPage<Size4K>,
    tables: [PhysicalPage<Size4K>; TABLES],
    /// Slots `0..tables_used` are bound to a directory index.
    tables_used: usize,
    policy: OverflowPolicy,
    stage: Stage,
    base_loaded: bool,
}

impl<'m, M: PhysMapper, const TABLES: usize> Translator<'m, M, TABLES> {
    /// Takes ownership of the `directory` and `tables` pages and clears them.
    ///
    /// # Safety
    /// - Every page must be reachable through `mapper` as writable memory
    ///   for `'m`, and must not be used by anything else while the
    ///   translator exists.
    /// - The pages must be distinct.
    ///
    /// # Panics
    /// If `TABLES` is zero.
    pub unsafe fn new(
        mapper: &'m M,
        directory: PhysicalPage<Size4K>,
        tables: [PhysicalPage<Size4K>; TABLES],
    ) -> Self {
        const { assert!(TABLES > 0, "at least one page table is required") };
        let mut translator = Self {
            mapper,
            directory,
            tables,
            tables_used: 1,
            policy: OverflowPolicy::default(),
            stage: Stage::Unmapped,
            base_loaded: false,
        };
        translator.clear_all();
        translator
    }

    /// Replaces the [`OverflowPolicy`].
    #[must_use]
    pub const fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Marks every directory and table entry absent and releases all table
    /// slots.
    ///
    /// # Errors
    /// [`TranslateError::TranslationActive`] once paging is on.
    pub fn reset(&mut self) -> Result<(), TranslateError> {
        self.ensure_mutable()?;
        self.clear_all();
        Ok(())
    }

    /// Maps one 4 KiB page per frame, starting at `virtual_base` and moving
    /// up 4 KiB per frame. Returns `virtual_base`.
    ///
    /// The offset bits of `virtual_base` are ignored for the mapping itself:
    /// the first frame backs the page containing it. Existing mappings for
    /// the same pages are overwritten.
    ///
    /// # Errors
    /// - [`TranslateError::EmptyFrameList`] if `frames` yields nothing;
    ///   nothing is written.
    /// - [`TranslateError::AddressOverflow`] if more frames follow the page
    ///   at `0xFFFF_F000`. Pages mapped up to that point stay mapped.
    /// - [`TranslateError::TablesExhausted`] under [`OverflowPolicy::Reject`].
    ///   Earlier pages of the same call stay mapped.
    /// - [`TranslateError::TranslationActive`] once paging is on.
    pub fn map<I>(
        &mut self,
        virtual_base: VirtualAddress,
        frames: I,
    ) -> Result<VirtualAddress, TranslateError>
    where
        I: IntoIterator<Item = PhysicalAddress>,
    {
        self.ensure_mutable()?;

        let mut frames = frames.into_iter().peekable();
        if frames.peek().is_none() {
            return Err(TranslateError::EmptyFrameList);
        }

        let mut next = Some(virtual_base);
        let mut mapped = 0usize;
        let mut folded = 0usize;
        for frame in frames {
            let Some(va) = next else {
                return Err(TranslateError::AddressOverflow {
                    base: virtual_base,
                    mapped,
                });
            };

            if self.map_page(va, frame)? {
                folded += 1;
            }
            mapped += 1;
            next = va.checked_add(Size4K::SIZE);
        }

        if folded > 0 {
            warn!(
                "{folded} of {mapped} pages at {virtual_base} had no page table and were folded into directory index 0"
            );
        }
        debug!("Mapped {mapped} pages at {virtual_base}");
        Ok(virtual_base)
    }

    /// Resets and then identity-maps the kernel image, the pages at and
    /// below the stack pointer and the text buffer.
    ///
    /// # Errors
    /// Whatever [`reset`](Self::reset) or [`map`](Self::map) report.
    pub fn identity_map_regions(&mut self, layout: &BootLayout) -> Result<(), TranslateError> {
        self.reset()?;

        for region in identity_regions(layout) {
            if region.is_empty() {
                debug!("Identity mapping {}: nothing to map", region.name());
                continue;
            }

            info!("Identity mapping {region}");
            self.map(VirtualAddress::new(region.start().as_u32()), region.frames())?;
        }

        info!("Identity mapping complete");
        Ok(())
    }

    /// Walks the tables the way the MMU would.
    ///
    /// Pages folded into directory index 0 are found at their folded
    /// address, not the one they were requested for.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (dir_slot, entry) = split_indices(va);
        let table = self.directory().get(dir_slot).table()?;
        if !self.tables.contains(&table) {
            return None;
        }

        // SAFETY: `table` is one of the pages handed to `new`.
        let table = unsafe { self.mapper.pt_mut(table) };
        let page = table.get(entry).page()?;
        Some(page.join(va.offset::<Size4K>()))
    }

    /// Installs the directory as the translation base.
    ///
    /// Allowed in any stage; reloading while translation is active flushes
    /// the TLB.
    ///
    /// # Safety
    /// See [`TranslationControl::load_base`].
    pub unsafe fn load_translation_base<C: TranslationControl>(&mut self, control: &mut C) {
        unsafe { control.load_base(self.directory) };
        self.base_loaded = true;
        info!("Translation base loaded: page directory at {}", self.directory);
    }

    /// Turns on paging.
    ///
    /// # Errors
    /// - [`TranslateError::TranslationActive`] if called a second time.
    /// - [`TranslateError::BaseNotLoaded`] if
    ///   [`load_translation_base`](Self::load_translation_base) has not run.
    ///
    /// # Safety
    /// The loaded directory must identity-map the executing code, the stack
    /// and every device used afterwards; see [`TranslationControl::enable`].
    pub unsafe fn enable_translation<C: TranslationControl>(
        &mut self,
        control: &mut C,
    ) -> Result<(), TranslateError> {
        self.ensure_mutable()?;
        if !self.base_loaded {
            return Err(TranslateError::BaseNotLoaded);
        }

        unsafe { control.enable() };
        self.stage = Stage::TranslationActive;
        info!("Paging enabled");
        Ok(())
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    #[must_use]
    pub const fn directory_page(&self) -> PhysicalPage<Size4K> {
        self.directory
    }

    #[must_use]
    pub const fn table_pages(&self) -> &[PhysicalPage<Size4K>; TABLES] {
        &self.tables
    }

    /// Number of table slots bound to a directory index (at least one).
    #[must_use]
    pub const fn tables_in_use(&self) -> usize {
        self.tables_used
    }

    #[must_use]
    pub fn directory(&self) -> &PageDirectory {
        // SAFETY: the directory page was handed to `new` for `'m`.
        unsafe { self.mapper.pd_mut(self.directory) }
    }

    /// Page table in `slot`, if the slot exists.
    #[must_use]
    pub fn table(&self, slot: usize) -> Option<&PageTable> {
        let page = *self.tables.get(slot)?;
        // SAFETY: every table page was handed to `new` for `'m`.
        Some(unsafe { self.mapper.pt_mut(page) })
    }

    /// Writes the PTE for `va`. Returns whether the page was folded into
    /// directory index 0.
    fn map_page(&mut self, va: VirtualAddress, frame: PhysicalAddress) -> Result<bool, TranslateError> {
        let (dir_slot, entry) = split_indices(va);
        let (table, folded) = self.table_for(dir_slot)?;

        // SAFETY: `table_for` only returns pages handed to `new`.
        let table = unsafe { self.mapper.pt_mut(table) };
        table.set(entry, Pte::new_kernel_page(frame.page::<Size4K>()));
        self.stage = Stage::TablesBuilt;
        Ok(folded)
    }

    /// Page table backing `index`, binding a new slot or folding if needed.
    fn table_for(&mut self, index: PdIndex) -> Result<(PhysicalPage<Size4K>, bool), TranslateError> {
        let low = PdIndex::new(0);

        if let Some(table) = self.directory().get(index).table() {
            return Ok((table, false));
        }

        if index == low {
            return Ok((self.bind(low, self.tables[0]), false));
        }

        if self.tables_used < TABLES {
            let table = self.tables[self.tables_used];
            self.tables_used += 1;
            return Ok((self.bind(index, table), false));
        }

        match self.policy {
            OverflowPolicy::Reject => Err(TranslateError::TablesExhausted(index.as_usize())),
            OverflowPolicy::Fold => {
                let table = match self.directory().get(low).table() {
                    Some(table) => table,
                    None => self.bind(low, self.tables[0]),
                };
                Ok((table, true))
            }
        }
    }

    /// Points directory entry `index` at `table` in a single store.
    fn bind(&mut self, index: PdIndex, table: PhysicalPage<Size4K>) -> PhysicalPage<Size4K> {
        // SAFETY: the directory page was handed to `new` for `'m`.
        let directory = unsafe { self.mapper.pd_mut(self.directory) };
        directory.set(index, Pde::new_kernel_table(table));
        debug!(
            "Directory index {} ({}) -> page table at {table}",
            index.as_usize(),
            index.base()
        );
        table
    }

    fn clear_all(&mut self) {
        // SAFETY: all pages were handed to `new` for `'m`.
        unsafe {
            self.mapper.pd_mut(self.directory).clear();
            for &table in &self.tables {
                self.mapper.pt_mut(table).clear();
            }
        }
        self.tables_used = 1;
        self.stage = Stage::Unmapped;
    }

    const fn ensure_mutable(&self) -> Result<(), TranslateError> {
        match self.stage {
            Stage::TranslationActive => Err(TranslateError::TranslationActive),
            Stage::Unmapped | Stage::TablesBuilt => Ok(()),
        }
    }
}
