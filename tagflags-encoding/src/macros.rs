/// Declares a `#[repr(u8)]` value enum backed by `num_enum` and implements [`EnumValue`](crate::EnumValue).
///
/// Each variant is paired with the tag-style name used for parsing and display.
/// Ordinals follow declaration order; mark the zero-decoding variant with `#[default]`.
macro_rules! value_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $tag:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            Default,
            num_enum::IntoPrimitive,
        )]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                #[cfg_attr(feature = "serde", serde(rename = $tag))]
                $variant
            ),+
        }

        impl $name {
            const VARIANTS: &'static [$name] = &[$($name::$variant),+];

            /// The tag-style name of this value.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }

            /// Looks a value up by its ordinal, falling back to the default variant.
            pub fn from_ordinal_or_default(ordinal: u8) -> Self {
                <Self as $crate::EnumValue>::from_ordinal(ordinal).unwrap_or_default()
            }
        }

        impl $crate::EnumValue for $name {
            const NAMES: &'static [&'static str] = &[$($tag),+];

            #[inline]
            fn ordinal(self) -> u8 {
                u8::from(self)
            }

            #[inline]
            fn from_ordinal(ordinal: u8) -> Option<Self> {
                Self::VARIANTS.get(usize::from(ordinal)).copied()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use value_enum;
