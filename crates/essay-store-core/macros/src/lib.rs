mod component;
use proc_macro::TokenStream;

extern crate proc_macro;
extern crate syn;
extern crate quote;

#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    component::derive_component(input)
}
