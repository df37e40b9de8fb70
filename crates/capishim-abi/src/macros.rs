//! Table macros that instantiate the forwarding pattern per symbol.
//!
//! `capi_symbols!` is the only place the trampoline shape is written down;
//! `symbols.rs` feeds it the signature table.

/// Argument list handed to the registry for call logging.
///
/// Expands to an empty slice when the `call-log` feature is off, so the
/// trampolines carry no formatting code at all.
#[cfg(feature = "call-log")]
macro_rules! call_args {
    ($($arg:ident),* $(,)?) => {
        &[$(&$arg as &dyn ::capishim_core::ArgRepr),*]
    };
}

#[cfg(not(feature = "call-log"))]
macro_rules! call_args {
    ($($arg:ident),* $(,)?) => {
        &[]
    };
}

/// Generate the symbol enum, the declaration table and one
/// `#[unsafe(no_mangle)] pub unsafe extern "C" fn` trampoline per entry.
///
/// # Usage
///
/// ```ignore
/// capi_symbols! {
///     forward {
///         fn PyList_New(len: Py_ssize_t) -> *mut PyObject;
///         fn Py_IncRef(o: *mut PyObject);
///     }
///     noreturn {
///         fn Py_Exit(status: c_int);
///     }
///     unimplemented {
///         fn PyCell_New(o: *mut PyObject) -> *mut PyObject;
///     }
/// }
/// ```
///
/// `forward` entries return whatever the target returns. `noreturn` entries
/// are exported as `-> !` and abort through the registry if the target
/// returns. `unimplemented` entries keep their C signature so extensions
/// link, but a call reports the symbol and exits without resolving it.
macro_rules! capi_symbols {
    (
        forward {
            $(
                $(#[$meta:meta])*
                fn $name:ident( $($arg:ident : $ty:ty),* $(,)? ) $(-> $ret:ty)?;
            )*
        }
        noreturn {
            $(
                $(#[$nmeta:meta])*
                fn $nname:ident( $($narg:ident : $nty:ty),* $(,)? );
            )*
        }
        unimplemented {
            $(
                $(#[$umeta:meta])*
                fn $uname:ident( $($uarg:ident : $uty:ty),* $(,)? ) $(-> $uret:ty)?;
            )*
        }
    ) => {
        /// Every exported symbol, in declaration order.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Symbol {
            $($name,)*
            $($nname,)*
            $($uname,)*
        }

        impl Symbol {
            pub const ALL: &'static [Symbol] = &[
                $(Symbol::$name,)*
                $(Symbol::$nname,)*
                $(Symbol::$uname,)*
            ];

            #[must_use]
            pub const fn id(self) -> ::capishim_core::SymbolId {
                ::capishim_core::SymbolId::new(self as u32)
            }

            #[must_use]
            pub fn decl(self) -> ::capishim_core::SymbolDecl {
                SYMBOLS[self as usize]
            }

            #[must_use]
            pub fn name(self) -> &'static str {
                SYMBOL_NAMES[self as usize]
            }

            /// Rust rendering of the C signature, e.g. `PyList_New(len: Py_ssize_t) -> *mut PyObject`.
            #[must_use]
            pub fn signature(self) -> &'static str {
                SIGNATURES[self as usize]
            }

            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                SYMBOL_NAMES
                    .iter()
                    .position(|candidate| *candidate == name)
                    .map(|index| Self::ALL[index])
            }
        }

        /// Declarations indexed by `Symbol as usize`.
        pub static SYMBOLS: &[::capishim_core::SymbolDecl] = &[
            $(
                ::capishim_core::SymbolDecl::forward(::capishim_core::symbol_name(
                    concat!(stringify!($name), "\0").as_bytes(),
                )),
            )*
            $(
                ::capishim_core::SymbolDecl::noreturn(::capishim_core::symbol_name(
                    concat!(stringify!($nname), "\0").as_bytes(),
                )),
            )*
            $(
                ::capishim_core::SymbolDecl::unimplemented(::capishim_core::symbol_name(
                    concat!(stringify!($uname), "\0").as_bytes(),
                )),
            )*
        ];

        static SYMBOL_NAMES: &[&str] = &[
            $(stringify!($name),)*
            $(stringify!($nname),)*
            $(stringify!($uname),)*
        ];

        static SIGNATURES: &[&str] = &[
            $(
                concat!(
                    stringify!($name), "(", stringify!($($arg: $ty),*), ")"
                    $(, " -> ", stringify!($ret))?
                ),
            )*
            $(
                concat!(stringify!($nname), "(", stringify!($($narg: $nty),*), ") -> !"),
            )*
            $(
                concat!(
                    stringify!($uname), "(", stringify!($($uarg: $uty),*), ")"
                    $(, " -> ", stringify!($uret))?
                ),
            )*
        ];

        $(
            $(#[$meta])*
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name( $($arg : $ty),* ) $(-> $ret)? {
                let invoke = |target: unsafe extern "C" fn($($ty),*) $(-> $ret)?| unsafe {
                    target($($arg),*)
                };
                // SAFETY: the target was resolved under this symbol's name and
                // has the signature declared here.
                unsafe {
                    $crate::runtime::registry().forward(
                        Symbol::$name.id(),
                        call_args!($($arg),*),
                        invoke,
                    )
                }
            }
        )*

        $(
            $(#[$nmeta])*
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $nname( $($narg : $nty),* ) -> ! {
                let invoke = |target: unsafe extern "C" fn($($nty),*)| unsafe {
                    target($($narg),*)
                };
                // SAFETY: as for forwarding trampolines.
                unsafe {
                    $crate::runtime::registry().forward_noreturn(
                        Symbol::$nname.id(),
                        call_args!($($narg),*),
                        invoke,
                    )
                }
            }
        )*

        $(
            $(#[$umeta])*
            #[unsafe(no_mangle)]
            #[allow(unused_variables)]
            pub unsafe extern "C" fn $uname( $($uarg : $uty),* ) $(-> $uret)? {
                $crate::runtime::registry().unimplemented(Symbol::$uname.id())
            }
        )*
    };
}

/// Reinterpret the `va_list` of a C-variadic function as a [`VaListPtr`].
///
/// Written as a macro so the unstable `VaList` type is never named.
///
/// [`VaListPtr`]: crate::types::VaListPtr
#[cfg(feature = "c-variadic")]
macro_rules! va_list_ptr {
    ($args:ident) => {{
        // SAFETY: a `va_list` argument is passed as one pointer on every
        // supported target, which is exactly the layout of `VaList`.
        let raw: *mut ::core::ffi::c_void =
            unsafe { ::core::mem::transmute($args.as_va_list()) };
        $crate::types::VaListPtr::from_raw(raw)
    }};
}

/// Generate exported C-variadic wrappers that pack `...` into a `va_list`
/// and call the matching `V` trampoline.
#[cfg(feature = "c-variadic")]
macro_rules! variadic_fns {
    (
        $(
            $(#[$meta:meta])*
            fn $name:ident( $($arg:ident : $ty:ty,)+ ... ) -> $ret:ty => $target:ident;
        )*
    ) => {
        $(
            $(#[$meta])*
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name( $($arg : $ty,)+ mut args: ... ) -> $ret {
                let va = va_list_ptr!(args);
                // SAFETY: `va` lives for the duration of this call only.
                unsafe { $crate::symbols::$target($($arg,)+ va) }
            }
        )*
    };
}

#[allow(unused_imports)]
pub(crate) use {call_args, capi_symbols};
#[cfg(feature = "c-variadic")]
#[allow(unused_imports)]
pub(crate) use {va_list_ptr, variadic_fns};
