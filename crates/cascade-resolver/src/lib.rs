//! Template resolution for node parameters.
//!
//! Any string inside a node's parameters may contain `{{ expression }}`
//! placeholders. They are resolved against [`Bindings`] right before the node
//! runs:
//!
//! ```json
//! {
//!   "url": "https://api.example.com/users/{{ json.user_id }}",
//!   "body": "{{ nodes.fetch-user.output }}",
//!   "subject": "Order {{ nodes.load.output.id }} for {{ context.tenant_id | upper }}"
//! }
//! ```
//!
//! A string that is exactly one placeholder yields the referenced value with
//! its JSON type (`body` above becomes an object). Placeholders embedded in a
//! longer string are stringified.
//!
//! Plain paths are looked up directly, so node ids with hyphens work.
//! Everything else (filters, comparisons, `utils.*` calls) is evaluated by
//! minijinja with strict undefined handling.

mod bindings;
mod error;
mod path;
mod resolver;
mod template;
mod utils;

pub use bindings::Bindings;
pub use error::ResolveError;
pub use resolver::{Resolver, resolve};
