//! SQL schema for the agentsync relational store.
//!
//! Mirrors the institution's normalized layout: one `resource` row per
//! identifier, agents keyed by `(resource_id, "order")`, and `role` and
//! `contactinfo` rows hanging off that composite key.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS resource (
    id          INTEGER PRIMARY KEY,
    identifier  TEXT NOT NULL UNIQUE COLLATE NOCASE,
    publisher   TEXT
);

-- "order" is the display sequence. Creators occupy the low orders,
-- contributor-only agents follow.
CREATE TABLE IF NOT EXISTS resourceagent (
    resource_id     INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    "order"         INTEGER NOT NULL,
    name            TEXT    NOT NULL CHECK (length(trim(name)) > 0),
    firstname       TEXT,
    lastname        TEXT,
    identifier      TEXT,            -- bare form, scheme prefix stripped
    identifiertype  TEXT,            -- 'ORCID' | 'ROR' | 'ISNI' | ...
    nametype        TEXT    NOT NULL DEFAULT 'Personal',
    PRIMARY KEY (resource_id, "order")
);

CREATE TABLE IF NOT EXISTS role (
    role                        TEXT    NOT NULL,
    resourceagent_resource_id   INTEGER NOT NULL,
    resourceagent_order         INTEGER NOT NULL,
    PRIMARY KEY (role, resourceagent_resource_id, resourceagent_order),
    FOREIGN KEY (resourceagent_resource_id, resourceagent_order)
        REFERENCES resourceagent(resource_id, "order")
        ON DELETE CASCADE ON UPDATE CASCADE
);

-- Present only for agents holding the ContactPerson role.
CREATE TABLE IF NOT EXISTS contactinfo (
    resourceagent_resource_id   INTEGER NOT NULL,
    resourceagent_order         INTEGER NOT NULL,
    email                       TEXT,
    website                     TEXT,
    position                    TEXT,
    PRIMARY KEY (resourceagent_resource_id, resourceagent_order),
    FOREIGN KEY (resourceagent_resource_id, resourceagent_order)
        REFERENCES resourceagent(resource_id, "order")
        ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE INDEX IF NOT EXISTS role_agent_idx
    ON role(resourceagent_resource_id, resourceagent_order);

PRAGMA user_version = 1;
"#;
