//! Technology-specific reference snippets, keyed by backend and unit.

use ideaforge_utils::types::UnitName;

/// Substituted when neither the settings store nor the table has an entry.
pub const NO_SPECIFIC_DOCS: &str =
    "No specific reference documentation is available for this stack. Follow the widely used conventions of the chosen technologies.";

struct RefDoc {
    backend: &'static str,
    unit: UnitName,
    text: &'static str,
}

const TABLE: &[RefDoc] = &[
    RefDoc {
        backend: "convex",
        unit: UnitName::Schema,
        text: "Convex schemas live in convex/schema.ts and are declared with defineSchema/defineTable and the v validators (v.string(), v.number(), v.id(\"table\"), v.optional(...)). Every document gets _id and _creationTime automatically; do not declare them. Relationships are stored as v.id(\"otherTable\") fields. Indexes are declared with .index(\"by_field\", [\"field\"]) and queried with withIndex.",
    },
    RefDoc {
        backend: "convex",
        unit: UnitName::ApiDesign,
        text: "Convex exposes server functions instead of REST routes: query (read-only, reactive), mutation (transactional writes) and action (side effects, external calls). Arguments are validated with the v validators. Clients call them through useQuery/useMutation with api.<module>.<function>. Authentication is read from ctx.auth.getUserIdentity(). HTTP endpoints, when needed, are declared in convex/http.ts with httpAction.",
    },
    RefDoc {
        backend: "convex",
        unit: UnitName::ComponentArchitecture,
        text: "With Convex, server state is read through useQuery and is reactive, so components rarely need a client cache. Wrap the app in ConvexProvider (or ConvexProviderWithAuth) and keep local UI state in components or a small store.",
    },
    RefDoc {
        backend: "supabase",
        unit: UnitName::Schema,
        text: "Supabase uses PostgreSQL. Define tables with SQL migrations, use uuid primary keys defaulting to gen_random_uuid(), timestamptz columns with now() defaults, and foreign keys with ON DELETE behaviour. User data references auth.users(id). Enable Row Level Security on every table and write policies per operation.",
    },
    RefDoc {
        backend: "supabase",
        unit: UnitName::ApiDesign,
        text: "Supabase auto-generates a REST (PostgREST) API per table, accessed through supabase-js (from(\"table\").select/insert/update/delete). Row Level Security policies are the authorization layer. Custom logic goes into Postgres functions (rpc) or Edge Functions. Realtime subscriptions use channel().on(\"postgres_changes\", ...).",
    },
    RefDoc {
        backend: "firebase",
        unit: UnitName::Schema,
        text: "Firestore is a document database: model data as collections of documents with subcollections for owned children. Denormalize for read paths, store references as document ids, and declare composite indexes in firestore.indexes.json. Security rules in firestore.rules enforce access.",
    },
    RefDoc {
        backend: "firebase",
        unit: UnitName::ApiDesign,
        text: "Firebase clients read and write Firestore directly under security rules. Server logic lives in Cloud Functions: callable functions (onCall) for client RPC, HTTPS functions (onRequest) for webhooks, and Firestore triggers for derived data.",
    },
    RefDoc {
        backend: "express",
        unit: UnitName::ApiDesign,
        text: "Express APIs follow REST conventions: plural resource paths, GET for reads, POST to create, PATCH/PUT to update, DELETE to remove. Validate bodies with a schema library, return JSON with consistent error objects, and protect routes with authentication middleware.",
    },
    RefDoc {
        backend: "express",
        unit: UnitName::Schema,
        text: "An Express backend usually pairs with a relational database through an ORM such as Prisma: declare models in schema.prisma with @id, @default, @relation and @@index attributes, and evolve the schema with migrations.",
    },
];

/// Reference documentation for `(backend, unit)`.
///
/// A non-blank `custom` entry wins. Otherwise the static table is consulted
/// with the backend matched case-insensitively. With no entry at all the
/// neutral [`NO_SPECIFIC_DOCS`] text is returned; a miss is never an error.
#[must_use]
pub fn resolve(custom: Option<String>, backend: &str, unit: UnitName) -> String {
    if let Some(doc) = custom.filter(|doc| !doc.trim().is_empty()) {
        return doc;
    }
    lookup(backend, unit).unwrap_or(NO_SPECIFIC_DOCS).to_string()
}

/// Static table lookup only.
#[must_use]
pub fn lookup(backend: &str, unit: UnitName) -> Option<&'static str> {
    let backend = backend.trim();
    TABLE
        .iter()
        .find(|entry| entry.unit == unit && entry.backend.eq_ignore_ascii_case(backend))
        .map(|entry| entry.text)
}
