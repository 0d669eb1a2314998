// SQ_THREAD_TRACE_MODE.MODE
pub const SQ_THREAD_TRACE_MODE_OFF: u32 = 0;
pub const SQ_THREAD_TRACE_MODE_ON: u32 = 1;

// SQ_THREAD_TRACE_MASK.VM_ID_MASK
pub const SQ_THREAD_TRACE_VM_ID_MASK_SINGLE: u32 = 0;
pub const SQ_THREAD_TRACE_VM_ID_MASK_ALL: u32 = 1;

pub const SQ_THREAD_TRACE_STATUS__BUSY_MASK: u32 = 0x4000_0000;

reg_bitfield! {
    pub struct SqThreadTraceMode {
        mask_ps: 0, 3;
        mask_vs: 3, 3;
        mask_gs: 6, 3;
        mask_es: 9, 3;
        mask_hs: 12, 3;
        mask_ls: 15, 3;
        mask_cs: 18, 3;
        mode: 21, 2;
        capture_mode: 23, 2;
        autoflush_en: 25, 1;
        priv_: 26, 1;
        issue_mask: 27, 2;
        test_mode: 29, 1;
        interrupt_en: 30, 1;
        wrap: 31, 1;
    }
}

reg_bitfield! {
    /// The stall enables only exist on CI+ (and on Oland/Hainan).
    pub struct SqThreadTraceMask {
        cu_sel: 0, 5;
        sh_sel: 5, 1;
        reg_stall_en: 7, 1;
        simd_en: 8, 4;
        vm_id_mask: 12, 2;
        spi_stall_en: 14, 1;
        sq_stall_en: 15, 1;
        random_seed: 16, 16;
    }
}

reg_bitfield! {
    pub struct SqThreadTraceTokenMask {
        token_mask: 0, 16;
        reg_mask: 16, 8;
        reg_drop_on_stall: 24, 1;
    }
}

reg_bitfield! {
    pub struct SqThreadTracePerfMask {
        sh0_mask: 0, 16;
        sh1_mask: 16, 16;
    }
}

reg_bitfield! {
    /// Buffer size in units of 4 KiB.
    pub struct SqThreadTraceSize {
        size: 0, 22;
    }
}

reg_bitfield! {
    /// Buffer address in units of 4 KiB.
    pub struct SqThreadTraceBase {
        addr: 0, 32;
    }
}

reg_bitfield! {
    pub struct SqThreadTraceCtrl {
        reset_buffer: 31, 1;
    }
}

reg_bitfield! {
    pub struct SqThreadTraceStatus {
        finish_pending: 0, 10;
        finish_done: 16, 10;
        new_buf: 29, 1;
        busy: 30, 1;
        full: 31, 1;
    }
}
