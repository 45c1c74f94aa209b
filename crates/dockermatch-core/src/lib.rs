pub mod config;
pub mod error;
pub mod facets;
pub mod inspect;
pub mod layers;
pub mod matcher;
pub mod normalize;
pub mod packages;
pub mod parser;
pub mod report;

pub use config::MatchConfig;
pub use error::{ErrorKind, MatchError};
pub use inspect::{BollardEngine, DockerEngine, ImageFacts, ImageInspector};
pub use matcher::{analyze, Matcher};
pub use normalize::{commands_equal, normalize, CommandInput, NormalizedCommand};
pub use packages::{parse_package_command, PackageCommand, PackageManager};
pub use parser::{DockerInstruction, DockerfileAnalysis, InstructionKind};
pub use report::{FacetName, FacetScore, LayerMatch, MatchQuality, MatchReport, MatchType};
