// Register images for the GFX6-GFX8 (SI/CI/VI) perfmon, RLC SPM and SQ thread trace blocks.
// ref: https://github.com/GPUOpen-Drivers/pal (gfx6 register headers)
// ref: drivers/gpu/drm/amd/include/asic_reg/gca/gfx_7_2_sh_mask.h

const fn field_mask(width: u32) -> u32 {
    if width >= 32 { u32::MAX } else { (1 << width) - 1 }
}

/// Declares a 32-bit register image with one getter, one `with_*` builder and one `set_*`
/// setter per bit field. Values wider than the field are truncated like the hardware does.
macro_rules! reg_bitfield {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident: $lsb:literal, $width:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        paste::paste! {
            impl $name {
                $(
                    $(#[$fmeta])*
                    pub const fn $field(&self) -> u32 {
                        (self.0 >> $lsb) & $crate::reg::field_mask($width)
                    }

                    pub const fn [<with_ $field>](self, val: u32) -> Self {
                        let mask = $crate::reg::field_mask($width) << $lsb;
                        Self((self.0 & !mask) | ((val << $lsb) & mask))
                    }

                    pub fn [<set_ $field>](&mut self, val: u32) {
                        *self = self.[<with_ $field>](val);
                    }
                )*
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    $( .field(stringify!($field), &self.$field()) )*
                    .finish()
            }
        }

        impl From<$name> for u32 {
            fn from(reg: $name) -> u32 {
                reg.0
            }
        }
    };
}

mod offsets;
pub use offsets::*;

mod perfmon;
pub use perfmon::*;

mod sqtt;
pub use sqtt::*;
