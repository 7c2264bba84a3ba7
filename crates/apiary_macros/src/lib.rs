use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, LitInt, Pat};

/// Ticks between unconditional timing reports for systems that take a `tick: Res<SimTick>`.
const REPORT_EVERY_TICKS: u64 = 300;

/// Times a system when the `perf_stats` feature is enabled.
///
/// The function body is wrapped with a drop guard that reports the elapsed
/// time under the `apiary::perf` log target. Without the feature the guard is
/// compiled out and the function is emitted unchanged.
///
/// A report is written when the body runs longer than the threshold
/// (microseconds, default 1000). If the system has a parameter named `tick`
/// whose type mentions `SimTick`, a report is also written every
/// 300 ticks so steady-state cost shows up in the logs.
///
/// ```ignore
/// #[profile(250)]
/// pub fn settle_flowers(query: Query<&mut Flower>, tick: Res<SimTick>) { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_us: u128 = if attr.is_empty() {
        1000
    } else {
        match syn::parse::<LitInt>(attr).and_then(|lit| lit.base10_parse::<u128>()) {
            Ok(value) => value,
            Err(_) => {
                return syn::Error::new(
                    Span::call_site(),
                    "#[profile] expects an optional integer threshold in microseconds",
                )
                .to_compile_error()
                .into();
            }
        }
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let system_name = sig.ident.to_string();

    let takes_tick = sig.inputs.iter().any(|arg| match arg {
        FnArg::Typed(pat_type) => match &*pat_type.pat {
            Pat::Ident(pat_ident) if pat_ident.ident == "tick" => {
                let ty = &pat_type.ty;
                quote!(#ty).to_string().contains("SimTick")
            }
            _ => false,
        },
        FnArg::Receiver(_) => false,
    });

    let tick_value = if takes_tick {
        quote! { Some(tick.0) }
    } else {
        quote! { None }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_guard = {
                struct ProfileGuard {
                    name: &'static str,
                    start: std::time::Instant,
                    tick: Option<u64>,
                }
                impl Drop for ProfileGuard {
                    fn drop(&mut self) {
                        let elapsed = self.start.elapsed();
                        let periodic = self.tick.is_some_and(|t| t % #REPORT_EVERY_TICKS == 0);
                        if elapsed.as_micros() > #threshold_us || periodic {
                            bevy::log::info!(
                                target: "apiary::perf",
                                "[PERF] {}: {:?} (tick {:?})",
                                self.name,
                                elapsed,
                                self.tick
                            );
                        }
                    }
                }
                ProfileGuard {
                    name: #system_name,
                    start: std::time::Instant::now(),
                    tick: #tick_value,
                }
            };

            #block
        }
    };

    output.into()
}
