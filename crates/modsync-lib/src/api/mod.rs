pub mod curseforge;

pub use curseforge::CurseForgeClient;
