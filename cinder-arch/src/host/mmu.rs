/// Translation control stand-in; nothing to program off-target.
pub struct Mmu;

impl Mmu {
    /// # Safety
    ///
    /// Same contract as the AArch64 implementation.
    pub unsafe fn enable(_ttbr0: u64, _ttbr1: u64) {}

    #[must_use]
    pub fn is_enabled() -> bool {
        false
    }

    /// # Safety
    ///
    /// Same contract as the AArch64 implementation.
    pub unsafe fn invalidate_tlb_all() {}
}
