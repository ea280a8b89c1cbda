//! Template catalog — a static lookup table from template id to base image.
//!
//! Each template is data (an image reference plus display metadata), not
//! behavior. Unknown template ids resolve to the base image rather than
//! failing, so stale records and typos degrade gracefully.

/// A workspace template: a named preset selecting a base container image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Identifier used on the command line (`--template <id>`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description of the preset.
    pub description: &'static str,
    /// Container image the template resolves to.
    pub image: &'static str,
}

/// Image used for the `base` template and for unrecognized template ids.
pub const DEFAULT_IMAGE: &str = "devboxhq/devbox:latest";

const TEMPLATES: &[Template] = &[
    Template {
        id: "base",
        name: "Base",
        description: "Ubuntu 22.04 + Node.js 20 + Python 3.10 + Git",
        image: DEFAULT_IMAGE,
    },
    Template {
        id: "minimal",
        name: "Minimal",
        description: "Alpine Linux - ultra-lightweight (~50MB)",
        image: "devboxhq/devbox-minimal:latest",
    },
    Template {
        id: "python",
        name: "Python Data Science",
        description: "Python + Jupyter + Pandas + NumPy + Scikit-learn + TensorFlow",
        image: "devboxhq/devbox-python:latest",
    },
    Template {
        id: "node",
        name: "Node.js",
        description: "Node.js 20 LTS + npm + yarn + pnpm + bun + TypeScript",
        image: "devboxhq/devbox-node:latest",
    },
    Template {
        id: "fullstack",
        name: "Full Stack",
        description: "Node.js + Python + PostgreSQL + Redis + Nginx + Docker",
        image: "devboxhq/devbox-fullstack:latest",
    },
    Template {
        id: "web",
        name: "Web Frontend",
        description: "React + Vue + Angular + Tailwind + testing tools",
        image: "devboxhq/devbox-web:latest",
    },
    Template {
        id: "ml",
        name: "Machine Learning",
        description: "TensorFlow + PyTorch + JAX + Jupyter + MLflow + Transformers",
        image: "devboxhq/devbox-ml:latest",
    },
    Template {
        id: "devops",
        name: "DevOps",
        description: "Terraform + Ansible + Kubernetes + Docker + cloud CLIs",
        image: "devboxhq/devbox-devops:latest",
    },
    Template {
        id: "go",
        name: "Go",
        description: "Go 1.22 + tools + Delve + Air",
        image: "devboxhq/devbox-go:latest",
    },
    Template {
        id: "rust",
        name: "Rust",
        description: "Rust stable + nightly + Cargo + Clippy + rust-analyzer",
        image: "devboxhq/devbox-rust:latest",
    },
    Template {
        id: "php",
        name: "PHP",
        description: "PHP 8.1 + Laravel + Composer + MySQL + Nginx",
        image: "devboxhq/devbox-php:latest",
    },
    Template {
        id: "ruby",
        name: "Ruby",
        description: "Ruby 3.3 + Rails + rbenv + PostgreSQL + Redis",
        image: "devboxhq/devbox-ruby:latest",
    },
    Template {
        id: "java",
        name: "Java",
        description: "OpenJDK 21 + Maven + Gradle + Spring Boot CLI",
        image: "devboxhq/devbox-java:latest",
    },
];

/// All known templates, in display order.
#[must_use]
pub fn templates() -> &'static [Template] {
    TEMPLATES
}

/// Resolve a template id to its image reference.
///
/// Unknown ids fall back to [`DEFAULT_IMAGE`] — template resolution never
/// fails outright.
#[must_use]
pub fn image_for_template(id: &str) -> &'static str {
    TEMPLATES
        .iter()
        .find(|t| t.id == id)
        .map_or(DEFAULT_IMAGE, |t| t.image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_for_template_known_ids() {
        assert_eq!(image_for_template("base"), DEFAULT_IMAGE);
        assert_eq!(image_for_template("rust"), "devboxhq/devbox-rust:latest");
        assert_eq!(image_for_template("ml"), "devboxhq/devbox-ml:latest");
    }

    #[test]
    fn test_image_for_template_unknown_falls_back() {
        assert_eq!(image_for_template("haskell"), DEFAULT_IMAGE);
        assert_eq!(image_for_template(""), DEFAULT_IMAGE);
    }

    #[test]
    fn test_template_ids_are_unique() {
        let mut ids: Vec<&str> = templates().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), templates().len(), "duplicate template id");
    }

    #[test]
    fn test_every_template_has_image_and_description() {
        for t in templates() {
            assert!(!t.image.is_empty(), "{} has no image", t.id);
            assert!(!t.description.is_empty(), "{} has no description", t.id);
        }
    }
}
