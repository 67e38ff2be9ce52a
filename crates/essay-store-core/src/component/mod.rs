mod component;
mod lifecycle;

pub use component::{
    Component, ComponentId, ComponentInfo, Components,
};

pub use lifecycle::{
    Lifecycle, CtorFn, DtorFn, CopyFn, MoveFn,
};
