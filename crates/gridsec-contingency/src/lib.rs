pub mod apply;
pub mod generate;
pub mod spec;

pub use apply::ApplyOutcome;
pub use generate::{generate_n1, generate_n2_branches, GenerationOptions};
pub use spec::{
    load_contingency_list, resolve_contingencies, save_contingency_list, Contingency,
    ContingencyElement, ContingencyList,
};
